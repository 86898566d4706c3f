//! Manifest correlation: index a Playwright-style `results.json` by recording path.
//!
//! The manifest is a tree of suites → specs → tests → results → attachments.
//! Suites may nest, and some reporters hang `tests` directly off a suite, so both
//! shapes are accepted. Every field is optional on the wire.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::artifacts::{TRACE_EXTENSION, VIDEO_EXTENSION};
use crate::constants::manifest::{PASSED_STATUS, TRACE_ATTACHMENT_NAME, VIDEO_ATTACHMENT_NAME};
use crate::data::{StageResult, TestResult, TestStage};
use crate::transport::fs::normalize_path;
use crate::types::BrowserName;

/// What the manifest knows about one recording.
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestEntry {
    /// Raw result status (`passed`, `failed`, `timedOut`, ...).
    pub outcome: String,
    /// Browser/project name.
    pub browser: Option<BrowserName>,
    /// Spec title.
    pub title: String,
    /// Absolute, normalized path of the companion trace archive.
    pub trace_path: Option<PathBuf>,
    /// Longest duration reported for this recording.
    pub duration_ms: u64,
    /// Start time of the result, when reported.
    pub start_time: Option<DateTime<Utc>>,
    /// First error message of the result.
    pub error_message: Option<String>,
    /// Stages built from reported steps (empty when the runner reported none).
    pub stages: Vec<TestStage>,
}

impl ManifestEntry {
    /// `passed` maps to success, every other status to failure.
    pub fn result(&self) -> TestResult {
        if self.outcome.eq_ignore_ascii_case(PASSED_STATUS) {
            TestResult::Success
        } else {
            TestResult::Failure
        }
    }
}

/// Recording path (absolute, normalized) → manifest entry.
#[derive(Clone, Debug, Default)]
pub struct ManifestIndex {
    entries: HashMap<PathBuf, ManifestEntry>,
}

impl ManifestIndex {
    /// Look up the entry for a discovered recording.
    pub fn get(&self, video_path: &Path) -> Option<&ManifestEntry> {
        self.entries.get(&normalize_path(video_path))
    }

    /// Number of indexed recordings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, path: PathBuf, entry: ManifestEntry) {
        match self.entries.get_mut(&path) {
            Some(existing) => {
                existing.duration_ms = existing.duration_ms.max(entry.duration_ms);
            }
            None => {
                self.entries.insert(path, entry);
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawManifest {
    suites: Vec<RawSuite>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSuite {
    title: String,
    suites: Vec<RawSuite>,
    specs: Vec<RawSpec>,
    tests: Vec<RawTest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSpec {
    title: String,
    tests: Vec<RawTest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawTest {
    title: Option<String>,
    project_name: Option<String>,
    results: Vec<RawResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawResult {
    status: Option<String>,
    duration: Option<f64>,
    start_time: Option<DateTime<Utc>>,
    errors: Vec<RawError>,
    error: Option<RawError>,
    steps: Vec<RawStep>,
    attachments: Vec<RawAttachment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawError {
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStep {
    title: String,
    error: Option<RawError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawAttachment {
    name: String,
    content_type: Option<String>,
    path: Option<String>,
}

impl RawAttachment {
    fn is_video(&self) -> bool {
        self.name == VIDEO_ATTACHMENT_NAME
            || self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("video/"))
            || self
                .path
                .as_deref()
                .is_some_and(|p| has_extension(p, VIDEO_EXTENSION))
    }

    fn is_trace(&self) -> bool {
        self.name == TRACE_ATTACHMENT_NAME
            || (self.content_type.as_deref() == Some("application/zip")
                && self
                    .path
                    .as_deref()
                    .is_some_and(|p| has_extension(p, TRACE_EXTENSION)))
    }
}

fn has_extension(path: &str, ext: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Load `root/file_name` and index its recordings.
///
/// Never fails: a missing or malformed manifest yields an empty index and the
/// caller falls back to filename-based classification.
pub fn correlate(root: &Path, file_name: &str) -> ManifestIndex {
    let manifest_path = root.join(file_name);
    let raw = match fs::read_to_string(&manifest_path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(
                path = %manifest_path.display(),
                error = %err,
                "[videos:manifest] no manifest; classifying from filenames"
            );
            return ManifestIndex::default();
        }
    };
    let index = parse_manifest(&raw, root);
    if let Some(index) = &index {
        info!(
            "[videos:manifest] indexed {} recordings from {}",
            index.len(),
            manifest_path.display()
        );
    }
    index.unwrap_or_else(|| {
        warn!(
            path = %manifest_path.display(),
            "[videos:manifest] malformed manifest ignored"
        );
        ManifestIndex::default()
    })
}

/// Parse manifest JSON; relative attachment paths resolve against `root`.
pub fn parse_manifest(raw: &str, root: &Path) -> Option<ManifestIndex> {
    let manifest: RawManifest = serde_json::from_str(raw).ok()?;
    let mut index = ManifestIndex::default();
    for suite in &manifest.suites {
        index_suite(suite, root, &mut index);
    }
    Some(index)
}

fn index_suite(suite: &RawSuite, root: &Path, index: &mut ManifestIndex) {
    for spec in &suite.specs {
        for test in &spec.tests {
            index_test(test, &spec.title, root, index);
        }
    }
    for test in &suite.tests {
        let title = test.title.as_deref().unwrap_or(&suite.title);
        index_test(test, title, root, index);
    }
    for child in &suite.suites {
        index_suite(child, root, index);
    }
}

fn index_test(test: &RawTest, title: &str, root: &Path, index: &mut ManifestIndex) {
    for result in &test.results {
        let trace_path = result
            .attachments
            .iter()
            .filter(|attachment| attachment.is_trace())
            .find_map(|attachment| attachment.path.as_deref())
            .map(|path| resolve(root, path));
        let error_message = result
            .errors
            .iter()
            .chain(result.error.iter())
            .find_map(|err| err.message.clone());
        for attachment in result.attachments.iter().filter(|a| a.is_video()) {
            let Some(path) = attachment.path.as_deref() else {
                continue;
            };
            let entry = ManifestEntry {
                outcome: result.status.clone().unwrap_or_default(),
                browser: test.project_name.clone().filter(|name| !name.is_empty()),
                title: title.to_string(),
                trace_path: trace_path.clone(),
                duration_ms: result.duration.unwrap_or(0.0).max(0.0) as u64,
                start_time: result.start_time,
                error_message: error_message.clone(),
                stages: stages_from_steps(&result.steps),
            };
            index.insert(resolve(root, path), entry);
        }
    }
}

fn stages_from_steps(steps: &[RawStep]) -> Vec<TestStage> {
    steps
        .iter()
        .enumerate()
        .map(|(idx, step)| {
            let error_detail = step.error.as_ref().and_then(|err| err.message.clone());
            TestStage {
                stage_number: idx as u32 + 1,
                name: step.title.clone(),
                result: if step.error.is_some() {
                    StageResult::Fail
                } else {
                    StageResult::Pass
                },
                error_detail,
                hints: None,
            }
        })
        .collect()
}

fn resolve(root: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&root.join(path))
    }
}
