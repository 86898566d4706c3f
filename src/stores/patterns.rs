//! Failure-pattern index keyed by a fingerprint of the failing stage.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::data::{ArtifactMetadata, Priority, TestResult, TestStage};
use crate::errors::PipelineError;
use crate::hash::short_digest;
use crate::stores::json_file::{JsonFileStore, StoreDocument};
use crate::stores::{ArtifactQuery, Queryable};
use crate::types::{FeatureName, ModuleName, PatternId, VideoId};
use crate::utils::{normalize_inline_whitespace, slugify};

/// A named failure shape recognised from stage names and error text.
struct KnownPattern {
    id: &'static str,
    kind: &'static str,
    description: &'static str,
    suggested_fix: &'static str,
    priority: Priority,
    name_keywords: &'static [&'static str],
    error_keywords: &'static [&'static str],
}

const KNOWN_PATTERNS: &[KnownPattern] = &[
    KnownPattern {
        id: "pause-overlay-blocking",
        kind: "ui_issue_pattern",
        description: "pause overlay intercepts clicks meant for other controls",
        suggested_fix: "lower the overlay z-index or let clicks pass through it",
        priority: Priority::Medium,
        name_keywords: &["pause"],
        error_keywords: &["overlay"],
    },
    KnownPattern {
        id: "responsive-design-issue",
        kind: "responsive_pattern",
        description: "layout breaks on small viewports",
        suggested_fix: "fix the responsive CSS and run the check per viewport",
        priority: Priority::Low,
        name_keywords: &["responsive"],
        error_keywords: &["mobile", "viewport"],
    },
    KnownPattern {
        id: "timeout-exceeded",
        kind: "timing_pattern",
        description: "an action or assertion ran past its timeout",
        suggested_fix: "wait on an explicit condition instead of a fixed delay",
        priority: Priority::Medium,
        name_keywords: &[],
        error_keywords: &["timeout", "timed out"],
    },
    KnownPattern {
        id: "selector-not-found",
        kind: "selector_pattern",
        description: "an expected element was never found",
        suggested_fix: "update the selector or wait for the element to render",
        priority: Priority::Medium,
        name_keywords: &[],
        error_keywords: &["not found", "no element", "waiting for locator"],
    },
];

/// What the index learns from one failing stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternMatch {
    /// Known pattern name or generic fingerprint.
    pub pattern_id: PatternId,
    /// Pattern family.
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// Fix suggested for the pattern.
    pub suggested_fix: String,
    /// Review priority.
    pub priority: Priority,
}

/// Fingerprint a failing stage: known rules first, then `stage-<slug>-<hash8>`.
pub fn fingerprint(stage: &TestStage) -> PatternMatch {
    let name = stage.name.to_lowercase();
    let error = stage.error_detail.as_deref().unwrap_or_default().to_lowercase();
    let known = KNOWN_PATTERNS.iter().find(|pattern| {
        pattern.name_keywords.iter().any(|kw| name.contains(kw))
            || pattern.error_keywords.iter().any(|kw| error.contains(kw))
    });
    if let Some(pattern) = known {
        return PatternMatch {
            pattern_id: pattern.id.to_string(),
            kind: pattern.kind.to_string(),
            description: pattern.description.to_string(),
            suggested_fix: pattern.suggested_fix.to_string(),
            priority: pattern.priority,
        };
    }

    let slug = slugify(&stage.name);
    let slug = if slug.is_empty() { "unnamed".to_string() } else { slug };
    let normalized = normalized_error(&error);
    let digest_input = if normalized.is_empty() { name.clone() } else { normalized };
    PatternMatch {
        pattern_id: format!("stage-{slug}-{}", short_digest(&digest_input)),
        kind: "stage_failure".to_string(),
        description: match &stage.error_detail {
            Some(detail) => format!("{} failed: {}", stage.name, normalize_inline_whitespace(detail)),
            None => format!("{} failed", stage.name),
        },
        suggested_fix: format!("investigate the {} stage", stage.name),
        priority: Priority::Medium,
    }
}

/// Whitespace-collapsed error text with digits masked so counters and ports group together.
fn normalized_error(error: &str) -> String {
    normalize_inline_whitespace(error)
        .chars()
        .map(|ch| if ch.is_ascii_digit() { '#' } else { ch })
        .collect()
}

/// One failing stage that matched a pattern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternOccurrence {
    /// Artifact it came from.
    pub video_id: VideoId,
    /// Module.
    pub module: ModuleName,
    /// Feature.
    pub feature: FeatureName,
    /// Stage name.
    pub stage: String,
    /// Error text, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When it was recorded.
    pub observed_at: DateTime<Utc>,
}

/// One failure pattern and every time it was seen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRecord {
    /// Pattern key.
    pub pattern_id: PatternId,
    /// Pattern family, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// Every observation, oldest first.
    pub occurrences: Vec<PatternOccurrence>,
    /// Length of `occurrences`.
    pub frequency: u64,
    /// Fix suggested for the pattern.
    pub suggested_fix: String,
    /// Review priority.
    pub priority: Priority,
    /// Lifecycle status; new patterns start as `identified`.
    pub status: String,
    /// First observation.
    pub first_seen: DateTime<Utc>,
    /// Latest observation.
    pub last_seen: DateTime<Utc>,
}

impl Queryable for PatternOccurrence {
    fn module(&self) -> &str {
        &self.module
    }

    fn feature(&self) -> &str {
        &self.feature
    }

    fn result(&self) -> TestResult {
        TestResult::Failure
    }

    fn searchable_text(&self) -> Vec<&str> {
        std::iter::once(self.stage.as_str())
            .chain(self.error.as_deref())
            .collect()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// Aggregate over the pattern index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternStats {
    /// Distinct patterns.
    pub total_patterns: u64,
    /// Observations across all patterns.
    pub total_occurrences: u64,
    /// Pattern count per family.
    pub by_type: BTreeMap<String, u64>,
}

/// On-disk pattern index document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatternDocument {
    /// Patterns keyed by id, in first-seen order.
    pub patterns: IndexMap<PatternId, PatternRecord>,
    /// Aggregate recomputed on every write.
    pub stats: PatternStats,
    /// Time of the last write.
    pub last_updated: Option<DateTime<Utc>>,
}

impl PatternDocument {
    /// Frequencies and totals as a pure function of the occurrence lists.
    pub fn recomputed_stats(&self) -> PatternStats {
        let mut by_type = BTreeMap::new();
        for record in self.patterns.values() {
            *by_type.entry(record.kind.clone()).or_insert(0) += record.occurrences.len() as u64;
        }
        PatternStats {
            total_patterns: self.patterns.len() as u64,
            total_occurrences: self
                .patterns
                .values()
                .map(|record| record.occurrences.len() as u64)
                .sum(),
            by_type,
        }
    }
}

impl StoreDocument for PatternDocument {
    const NAME: &'static str = "patterns";

    fn recompute(&mut self) {
        for record in self.patterns.values_mut() {
            record.frequency = record.occurrences.len() as u64;
            if let Some(first) = record.occurrences.iter().map(|o| o.observed_at).min() {
                record.first_seen = first;
            }
            if let Some(last) = record.occurrences.iter().map(|o| o.observed_at).max() {
                record.last_seen = last;
            }
        }
        self.stats = self.recomputed_stats();
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_updated = Some(at);
    }
}

/// Failure-pattern index stored as one JSON document.
#[derive(Clone, Debug)]
pub struct PatternIndex {
    file: JsonFileStore<PatternDocument>,
}

impl PatternIndex {
    /// Index stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFileStore::new(path),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the index; a missing file is an empty index.
    pub fn load(&self) -> Result<PatternDocument, PipelineError> {
        self.file.load()
    }

    /// Record one occurrence per failing stage; returns the pattern ids touched.
    ///
    /// Artifacts without failing stages leave the file untouched.
    pub fn observe(&self, meta: &ArtifactMetadata) -> Result<Vec<PatternId>, PipelineError> {
        let failing: Vec<&TestStage> = meta.failed_stages().collect();
        if failing.is_empty() {
            return Ok(Vec::new());
        }
        self.file.mutate(|doc| {
            let mut touched = Vec::with_capacity(failing.len());
            for stage in failing {
                let found = fingerprint(stage);
                let occurrence = PatternOccurrence {
                    video_id: meta.video_id.clone(),
                    module: meta.module.clone(),
                    feature: meta.feature.clone(),
                    stage: stage.name.clone(),
                    error: stage.error_detail.clone(),
                    observed_at: meta.test_date,
                };
                doc.patterns
                    .entry(found.pattern_id.clone())
                    .or_insert_with(|| PatternRecord {
                        pattern_id: found.pattern_id.clone(),
                        kind: found.kind,
                        description: found.description,
                        occurrences: Vec::new(),
                        frequency: 0,
                        suggested_fix: found.suggested_fix,
                        priority: found.priority,
                        status: "identified".to_string(),
                        first_seen: meta.test_date,
                        last_seen: meta.test_date,
                    })
                    .occurrences
                    .push(occurrence);
                if !touched.contains(&found.pattern_id) {
                    touched.push(found.pattern_id);
                }
            }
            touched
        })
    }

    /// Patterns with at least one matching occurrence.
    pub fn query(&self, query: &ArtifactQuery) -> Result<Vec<PatternRecord>, PipelineError> {
        Ok(self
            .load()?
            .patterns
            .into_values()
            .filter(|record| record.occurrences.iter().any(|o| query.matches(o)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StageResult;
    use crate::data::fixtures::sample_record;
    use tempfile::tempdir;

    fn failing(name: &str, error: Option<&str>) -> TestStage {
        TestStage {
            stage_number: 1,
            name: name.to_string(),
            result: StageResult::Fail,
            error_detail: error.map(str::to_string),
            hints: None,
        }
    }

    #[test]
    fn known_patterns_match_name_or_error() {
        assert_eq!(fingerprint(&failing("pause menu", None)).pattern_id, "pause-overlay-blocking");
        assert_eq!(
            fingerprint(&failing("layout", Some("element hidden in mobile view"))).pattern_id,
            "responsive-design-issue"
        );
        assert_eq!(
            fingerprint(&failing("drag", Some("Timeout 5000ms exceeded"))).pattern_id,
            "timeout-exceeded"
        );
    }

    #[test]
    fn generic_fingerprint_groups_numeric_variants() {
        let a = fingerprint(&failing("Score Board", Some("expected 3 points got 2")));
        let b = fingerprint(&failing("Score Board", Some("expected 7 points got 1")));
        let c = fingerprint(&failing("Score Board", Some("score widget missing")));
        assert!(a.pattern_id.starts_with("stage-score-board-"));
        assert_eq!(a.pattern_id, b.pattern_id);
        assert_ne!(a.pattern_id, c.pattern_id);
    }

    #[test]
    fn observe_accumulates_occurrences() {
        let dir = tempdir().unwrap();
        let index = PatternIndex::new(dir.path().join("test-patterns.json"));
        let failure = sample_record("a", "games", "match", TestResult::Failure);
        let success = sample_record("b", "games", "match", TestResult::Success);

        assert_eq!(index.observe(&failure.metadata).unwrap(), vec!["timeout-exceeded".to_string()]);
        assert!(index.observe(&success.metadata).unwrap().is_empty());
        index.observe(&failure.metadata).unwrap();

        let doc = index.load().unwrap();
        let record = &doc.patterns["timeout-exceeded"];
        assert_eq!(record.frequency, 2);
        assert_eq!(record.occurrences.len(), 2);
        assert_eq!(doc.stats, doc.recomputed_stats());
        assert_eq!(doc.stats.total_occurrences, 2);
        assert_eq!(index.query(&ArtifactQuery::new().keyword("gameplay")).unwrap().len(), 1);
    }
}
