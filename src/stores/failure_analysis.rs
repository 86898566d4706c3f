//! Append-only structured analyses of failed artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::data::{ArtifactMetadata, TestResult, TestStage};
use crate::errors::PipelineError;
use crate::stores::json_file::{JsonFileStore, StoreDocument};
use crate::types::{FeatureName, ModuleName, PatternId, VideoId};

/// Broad class of a failure, from keywords in the failing stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// Element, layout, or interaction problems.
    UiFailure,
    /// Wrong state or assertion failures.
    LogicFailure,
    /// Timeouts and slowness.
    PerformanceFailure,
    /// Nothing matched.
    UnknownFailure,
}

impl FailureType {
    /// Classify one failing stage by its name.
    pub fn for_stage(stage: &TestStage) -> Self {
        let name = stage.name.to_lowercase();
        let words: Vec<&str> = name
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();
        let has = |keys: &[&str]| {
            keys.iter().any(|key| {
                if key.contains(' ') {
                    name.contains(key)
                } else {
                    words.iter().any(|word| word.starts_with(key))
                }
            })
        };
        if has(&["ui", "interface", "layout", "overlay"]) {
            FailureType::UiFailure
        } else if has(&["function", "logic", "gameplay", "generation"]) {
            FailureType::LogicFailure
        } else if has(&["performance", "speed", "load time"]) {
            FailureType::PerformanceFailure
        } else {
            FailureType::UnknownFailure
        }
    }
}

/// How much of the run a failure affected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// One failing stage.
    Low,
    /// Two or three failing stages.
    Medium,
    /// More than three failing stages.
    High,
}

impl Impact {
    /// More than three failing stages is high, more than one is medium.
    pub fn for_failed_count(count: usize) -> Self {
        match count {
            n if n > 3 => Impact::High,
            n if n > 1 => Impact::Medium,
            _ => Impact::Low,
        }
    }
}

/// Root-cause notes for one failing stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedStageAnalysis {
    /// 1-based stage position.
    pub stage_number: u32,
    /// Stage name.
    pub name: String,
    /// Error text, or a placeholder.
    pub error: String,
    /// Most likely cause.
    pub root_cause: String,
}

/// Structured analysis of one failed artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAnalysis {
    /// `{videoId}-failure-{n}`.
    pub analysis_id: String,
    /// Artifact analysed.
    pub video_id: VideoId,
    /// Module.
    pub module: ModuleName,
    /// Feature.
    pub feature: FeatureName,
    /// Broad failure class.
    pub failure_type: FailureType,
    /// Failing stages, in order.
    pub failed_stages: Vec<FailedStageAnalysis>,
    /// Scope of the failure.
    pub impact: Impact,
    /// Suggested fixes, most specific first.
    pub fix_strategy: Vec<String>,
    /// Steps that keep the failure from recurring.
    pub prevention_measures: Vec<String>,
    /// Pattern ids observed for the failing stages.
    pub related_patterns: Vec<PatternId>,
    /// When the analysis was written.
    pub timestamp: DateTime<Utc>,
}

/// Aggregate over every analysis.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureStats {
    /// Analyses in the log.
    pub total_analyses: u64,
    /// Count per failure type.
    pub by_failure_type: BTreeMap<FailureType, u64>,
}

impl FailureStats {
    /// Recompute the aggregate from `analyses`.
    pub fn from_analyses(analyses: &[FailureAnalysis]) -> Self {
        let mut by_failure_type = BTreeMap::new();
        for analysis in analyses {
            *by_failure_type.entry(analysis.failure_type).or_insert(0) += 1;
        }
        Self {
            total_analyses: analyses.len() as u64,
            by_failure_type,
        }
    }
}

/// On-disk failure analysis document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FailureAnalysisDocument {
    /// Append-only analyses.
    pub analyses: Vec<FailureAnalysis>,
    /// Aggregate recomputed on every write.
    pub stats: FailureStats,
    /// Time of the last write.
    pub last_updated: Option<DateTime<Utc>>,
}

impl StoreDocument for FailureAnalysisDocument {
    const NAME: &'static str = "failure-analysis";

    fn recompute(&mut self) {
        self.stats = FailureStats::from_analyses(&self.analyses);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_updated = Some(at);
    }
}

/// Append-only failure analysis log.
#[derive(Clone, Debug)]
pub struct FailureAnalysisStore {
    file: JsonFileStore<FailureAnalysisDocument>,
}

impl FailureAnalysisStore {
    /// Log stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFileStore::new(path),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the log; a missing file is an empty log.
    pub fn load(&self) -> Result<FailureAnalysisDocument, PipelineError> {
        self.file.load()
    }

    /// Append an analysis for a failed artifact with failing stages.
    ///
    /// Returns the analysis id, or `None` when there was nothing to analyze.
    pub fn analyze(
        &self,
        meta: &ArtifactMetadata,
        related_patterns: &[PatternId],
    ) -> Result<Option<String>, PipelineError> {
        if meta.result != TestResult::Failure {
            return Ok(None);
        }
        let failed: Vec<&TestStage> = meta.failed_stages().collect();
        if failed.is_empty() {
            return Ok(None);
        }
        let analysis_stages: Vec<FailedStageAnalysis> = failed
            .iter()
            .map(|stage| FailedStageAnalysis {
                stage_number: stage.stage_number,
                name: stage.name.clone(),
                error: stage
                    .error_detail
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
                root_cause: root_cause(stage),
            })
            .collect();
        let failure_type = failed
            .first()
            .map(|stage| FailureType::for_stage(stage))
            .unwrap_or(FailureType::UnknownFailure);
        let fix_strategy = failed
            .iter()
            .map(|stage| format!("fix the {} stage", stage.name))
            .collect();
        let impact = Impact::for_failed_count(failed.len());

        self.file.mutate(|doc| {
            let analysis_id = format!("{}-failure-{}", meta.video_id, doc.analyses.len() + 1);
            doc.analyses.push(FailureAnalysis {
                analysis_id: analysis_id.clone(),
                video_id: meta.video_id.clone(),
                module: meta.module.clone(),
                feature: meta.feature.clone(),
                failure_type,
                failed_stages: analysis_stages,
                impact,
                fix_strategy,
                prevention_measures: prevention_measures(failure_type),
                related_patterns: related_patterns.to_vec(),
                timestamp: meta.test_date,
            });
            Some(analysis_id)
        })
    }
}

fn root_cause(stage: &TestStage) -> String {
    let name = stage.name.to_lowercase();
    if name.contains("pause") {
        "pause overlay design".to_string()
    } else if name.contains("responsive") {
        "responsive layout handling".to_string()
    } else if let Some(detail) = &stage.error_detail {
        detail.clone()
    } else {
        "needs further analysis".to_string()
    }
}

fn prevention_measures(failure_type: FailureType) -> Vec<String> {
    let specific = match failure_type {
        FailureType::UiFailure => "add visual regression checks",
        FailureType::LogicFailure => "cover the logic with unit tests",
        FailureType::PerformanceFailure => "track timings in CI",
        FailureType::UnknownFailure => "improve test diagnostics",
    };
    vec!["increase test coverage".to_string(), specific.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_record;
    use tempfile::tempdir;

    #[test]
    fn only_failures_with_failing_stages_are_analyzed() {
        let dir = tempdir().unwrap();
        let store = FailureAnalysisStore::new(dir.path().join("failure-analysis.json"));
        let success = sample_record("a", "games", "match", TestResult::Success);
        assert_eq!(store.analyze(&success.metadata, &[]).unwrap(), None);
        assert!(!store.path().exists());

        let failure = sample_record("b", "games", "match", TestResult::Failure);
        let id = store
            .analyze(&failure.metadata, &["timeout-exceeded".to_string()])
            .unwrap();
        assert_eq!(id.as_deref(), Some("b-failure-1"));

        let doc = store.load().unwrap();
        let analysis = &doc.analyses[0];
        assert_eq!(analysis.failure_type, FailureType::LogicFailure);
        assert_eq!(analysis.impact, Impact::Low);
        assert_eq!(analysis.failed_stages[0].root_cause, "Timeout 5000ms exceeded");
        assert_eq!(analysis.related_patterns, vec!["timeout-exceeded".to_string()]);
        assert_eq!(doc.stats, FailureStats::from_analyses(&doc.analyses));
        assert_eq!(doc.stats.by_failure_type[&FailureType::LogicFailure], 1);
    }

    #[test]
    fn failure_type_matches_whole_words() {
        let stage = |name: &str| TestStage {
            stage_number: 1,
            name: name.to_string(),
            result: crate::data::StageResult::Fail,
            error_detail: None,
            hints: None,
        };
        assert_eq!(FailureType::for_stage(&stage("UI layout")), FailureType::UiFailure);
        assert_eq!(FailureType::for_stage(&stage("quiz gameplay")), FailureType::LogicFailure);
        assert_eq!(FailureType::for_stage(&stage("page load time")), FailureType::PerformanceFailure);
        assert_eq!(FailureType::for_stage(&stage("home navigation")), FailureType::UnknownFailure);
    }

    #[test]
    fn impact_scales_with_failed_stage_count() {
        assert_eq!(Impact::for_failed_count(1), Impact::Low);
        assert_eq!(Impact::for_failed_count(2), Impact::Medium);
        assert_eq!(Impact::for_failed_count(4), Impact::High);
    }
}
