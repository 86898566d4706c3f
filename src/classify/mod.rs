//! Metadata derivation: manifest entry, then structured filename, then keyword
//! rules, then hard defaults. Every field records how it was determined and the
//! weakest field sets the record's confidence.

pub mod filename;
pub mod rules;
pub mod stages;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Overrides;
use crate::constants::classify::{
    DEFAULT_BROWSER, DEFAULT_FEATURE, DEFAULT_MODULE, DEFAULT_SEQUENCE, DEFAULT_VERSION,
    TEST_NAME_SUFFIX,
};
use crate::data::{ArtifactMetadata, Confidence, Priority, TestResult, TestStage};
use crate::errors::PipelineError;
use crate::manifest::ManifestEntry;
use crate::transport::fs::{file_mtime, file_size};

pub use filename::{StructuredName, parse_structured, video_id_for};
pub use stages::default_stages;

/// A derived value paired with where it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Resolved<T> {
    value: T,
    confidence: Confidence,
}

impl<T> Resolved<T> {
    fn classified(value: T) -> Self {
        Self { value, confidence: Confidence::Classified }
    }

    fn inferred(value: T) -> Self {
        Self { value, confidence: Confidence::Inferred }
    }

    fn defaulted(value: T) -> Self {
        Self { value, confidence: Confidence::Defaulted }
    }
}

/// Turns a discovered recording (plus optional manifest entry) into [`ArtifactMetadata`].
#[derive(Clone, Debug)]
pub struct MetadataDeriver {
    input_root: PathBuf,
    overrides: Overrides,
}

impl MetadataDeriver {
    /// Deriver resolving video ids relative to `input_root`.
    pub fn new(input_root: impl Into<PathBuf>, overrides: Overrides) -> Self {
        Self {
            input_root: input_root.into(),
            overrides,
        }
    }

    /// Derive metadata for `path`.
    ///
    /// Classification never fails; the only error is failing to stat the file.
    pub fn derive(
        &self,
        path: &Path,
        entry: Option<&ManifestEntry>,
    ) -> Result<ArtifactMetadata, PipelineError> {
        let original_size_bytes = file_size(path)?;
        let modified = file_mtime(path);
        Ok(self.derive_with(path, entry, original_size_bytes, modified))
    }

    /// Pure half of [`derive`](Self::derive), with size and mtime supplied.
    pub fn derive_with(
        &self,
        path: &Path,
        entry: Option<&ManifestEntry>,
        original_size_bytes: u64,
        modified: Option<DateTime<Utc>>,
    ) -> ArtifactMetadata {
        let video_id = video_id_for(&self.input_root, path);
        let original_file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| video_id.clone());
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let structured = parse_structured(&stem);
        let keyword_name = video_id.as_str();

        let (module, feature) = self.resolve_module_feature(structured.as_ref(), keyword_name);
        let result = resolve_result(entry, structured.as_ref(), keyword_name);
        let version = match (&self.overrides.version, structured.as_ref().and_then(|s| s.version.clone())) {
            (Some(version), _) => version.clone(),
            (None, Some(version)) => version,
            (None, None) => DEFAULT_VERSION.to_string(),
        };
        let sequence = structured
            .as_ref()
            .and_then(|s| s.sequence.clone())
            .unwrap_or_else(|| DEFAULT_SEQUENCE.to_string());

        let confidence = [module.confidence, feature.confidence, result.confidence]
            .into_iter()
            .min()
            .unwrap_or(Confidence::Defaulted);

        let test_date = entry
            .and_then(|entry| entry.start_time)
            .or_else(|| {
                structured
                    .as_ref()
                    .and_then(|s| s.date)
                    .map(|date| filename::date_with_time_of_day(date, modified))
            })
            .or(modified)
            .unwrap_or_else(Utc::now);

        let stages = match entry {
            Some(entry) if !entry.stages.is_empty() => {
                attach_error_detail(entry.stages.clone(), entry.error_message.as_deref())
            }
            _ => default_stages(&module.value, result.value),
        };

        let title = entry
            .map(|entry| entry.title.trim())
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}{}", feature.value, TEST_NAME_SUFFIX));

        if confidence.is_unmapped() {
            debug!(
                video_id = %video_id,
                "[videos:classify] classification fell back to defaults"
            );
        }

        ArtifactMetadata {
            priority: Priority::for_artifact(&module.value, result.value),
            video_id,
            original_file_name,
            module: module.value,
            feature: feature.value,
            result: result.value,
            version,
            sequence,
            confidence,
            unmapped: confidence.is_unmapped(),
            browser: entry
                .and_then(|entry| entry.browser.clone())
                .unwrap_or_else(|| DEFAULT_BROWSER.to_string()),
            title,
            trace_path: entry.and_then(|entry| entry.trace_path.clone()),
            test_date,
            duration_ms: entry.map(|entry| entry.duration_ms).unwrap_or(0),
            original_size_bytes,
            source_path: path.to_path_buf(),
            stages,
            error_message: entry.and_then(|entry| entry.error_message.clone()),
        }
    }

    fn resolve_module_feature(
        &self,
        structured: Option<&StructuredName>,
        keyword_name: &str,
    ) -> (Resolved<String>, Resolved<String>) {
        let guess = rules::infer_module(keyword_name);
        let module = if let Some(module) = &self.overrides.module {
            Resolved::classified(module.clone())
        } else if let Some(module) = structured.and_then(|s| s.module.clone()) {
            Resolved::classified(module)
        } else if let Some(guess) = guess {
            Resolved::inferred(guess.module.to_string())
        } else {
            Resolved::defaulted(DEFAULT_MODULE.to_string())
        };
        let feature = if let Some(feature) = &self.overrides.feature {
            Resolved::classified(feature.clone())
        } else if let Some(feature) = structured.and_then(|s| s.feature.clone()) {
            Resolved::classified(feature)
        } else if let Some(guess) = guess {
            Resolved::inferred(guess.feature.to_string())
        } else {
            Resolved::defaulted(DEFAULT_FEATURE.to_string())
        };
        (module, feature)
    }
}

fn resolve_result(
    entry: Option<&ManifestEntry>,
    structured: Option<&StructuredName>,
    keyword_name: &str,
) -> Resolved<TestResult> {
    if let Some(entry) = entry {
        return Resolved::classified(entry.result());
    }
    if let Some(result) = structured.and_then(|s| s.result) {
        return Resolved::classified(result);
    }
    match rules::infer_result(keyword_name) {
        Some(result) => Resolved::inferred(result),
        None => Resolved::defaulted(TestResult::Success),
    }
}

/// The first failing stage without detail inherits the run's first error message.
fn attach_error_detail(mut stages: Vec<TestStage>, error_message: Option<&str>) -> Vec<TestStage> {
    if let Some(message) = error_message
        && let Some(stage) = stages
            .iter_mut()
            .find(|stage| stage.failed() && stage.error_detail.is_none())
    {
        stage.error_detail = Some(message.to_string());
    }
    stages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{StageResult, TestStage};
    use chrono::TimeZone;

    fn deriver() -> MetadataDeriver {
        MetadataDeriver::new("/in", Overrides::default())
    }

    fn entry(status: &str) -> ManifestEntry {
        ManifestEntry {
            outcome: status.to_string(),
            browser: Some("webkit".to_string()),
            title: "drag cards into pairs".to_string(),
            trace_path: Some(PathBuf::from("/in/trace.zip")),
            duration_ms: 4200,
            start_time: None,
            error_message: Some("locator not found".to_string()),
            stages: vec![
                TestStage {
                    stage_number: 1,
                    name: "open".to_string(),
                    result: StageResult::Pass,
                    error_detail: None,
                    hints: None,
                },
                TestStage {
                    stage_number: 2,
                    name: "drag".to_string(),
                    result: StageResult::Fail,
                    error_detail: None,
                    hints: None,
                },
            ],
        }
    }

    #[test]
    fn structured_filename_is_classified() {
        let mtime = Utc.with_ymd_and_hms(2025, 3, 4, 10, 20, 30).unwrap();
        let meta = deriver().derive_with(
            Path::new("/in/20240101_games_MatchGame_fail_v1.0.0_001.webm"),
            None,
            2_000_000,
            Some(mtime),
        );
        assert_eq!(meta.video_id, "20240101_games_MatchGame_fail_v1.0.0_001");
        assert_eq!(meta.module, "games");
        assert_eq!(meta.feature, "MatchGame");
        assert_eq!(meta.result, TestResult::Failure);
        assert!(!meta.unmapped);
        assert_eq!(meta.confidence, Confidence::Classified);
        assert_eq!(meta.browser, "chromium");
        assert_eq!(meta.title, "MatchGame-test");
        assert_eq!(meta.test_date, Utc.with_ymd_and_hms(2024, 1, 1, 10, 20, 30).unwrap());
        assert_eq!(meta.priority, Priority::High);
        assert_eq!(meta.stages.len(), 6);
    }

    #[test]
    fn manifest_entry_wins_for_result_and_provenance() {
        let meta = deriver().derive_with(
            Path::new("/in/match-suite/video.webm"),
            Some(&entry("failed")),
            10,
            None,
        );
        assert_eq!(meta.result, TestResult::Failure);
        assert_eq!(meta.browser, "webkit");
        assert_eq!(meta.title, "drag cards into pairs");
        assert_eq!(meta.duration_ms, 4200);
        assert_eq!(meta.module, "games");
        assert_eq!(meta.feature, "match-game");
        assert_eq!(meta.confidence, Confidence::Inferred);
        assert!(!meta.unmapped);
        assert_eq!(meta.stages.len(), 2);
        assert_eq!(meta.stages[1].error_detail.as_deref(), Some("locator not found"));
    }

    #[test]
    fn unknown_names_are_defaulted_and_unmapped() {
        let meta = deriver().derive_with(Path::new("/in/recording.webm"), None, 10, None);
        assert_eq!(meta.module, "games");
        assert_eq!(meta.feature, "unknown");
        assert_eq!(meta.result, TestResult::Success);
        assert_eq!(meta.confidence, Confidence::Defaulted);
        assert!(meta.unmapped);
    }

    #[test]
    fn overrides_count_as_confident() {
        let overrides = Overrides {
            module: Some("content".to_string()),
            feature: Some("quiz".to_string()),
            version: Some("v2.0.0".to_string()),
        };
        let meta = MetadataDeriver::new("/in", overrides).derive_with(
            Path::new("/in/quiz-passed.webm"),
            None,
            10,
            None,
        );
        assert_eq!(meta.module, "content");
        assert_eq!(meta.feature, "quiz");
        assert_eq!(meta.version, "v2.0.0");
        assert_eq!(meta.result, TestResult::Success);
        assert_eq!(meta.confidence, Confidence::Inferred);
        assert_eq!(meta.stages.len(), 5);
    }
}
