use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub use crate::types::{BrowserName, FeatureName, ModuleName, VersionLabel, VideoId};

/// Outcome of the recorded test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    /// The test passed.
    Success,
    /// The test failed.
    Failure,
}

impl TestResult {
    /// Lowercase wire and directory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestResult::Success => "success",
            TestResult::Failure => "failure",
        }
    }

    /// Parse loose result tokens (`pass`, `passed`, `fail`, `error`, ...).
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "success" | "succeeded" | "pass" | "passed" | "ok" => Some(TestResult::Success),
            "failure" | "failed" | "fail" | "error" | "timedout" => Some(TestResult::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one stage within a test run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageResult {
    /// Stage completed.
    Pass,
    /// Stage failed.
    Fail,
}

/// How confidently a record was classified.
///
/// Ordered from least to most confident so the weakest field wins via `min`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// At least one field fell back to a hard default.
    Defaulted,
    /// Fields came from keyword rules on the raw name.
    Inferred,
    /// Fields came from the manifest, a structured filename, or an override.
    Classified,
}

impl Confidence {
    /// `unmapped` is the reporting-facing view of a defaulted classification.
    pub fn is_unmapped(&self) -> bool {
        matches!(self, Confidence::Defaulted)
    }
}

/// Review priority attached to catalog and memory entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Routine review.
    Low,
    /// Review soon.
    Medium,
    /// Review first.
    High,
}

impl Priority {
    /// Failures first, then the modules with the most user-facing surface.
    pub fn for_artifact(module: &str, result: TestResult) -> Self {
        if result == TestResult::Failure {
            return Priority::High;
        }
        match module {
            "games" => Priority::High,
            "content" => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

/// Requested encoding tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Highest bitrate, full resolution.
    High,
    /// Default tier.
    Standard,
    /// Lowest bitrate for large or system recordings.
    Archive,
}

impl QualityTier {
    /// Lowercase tier name.
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::High => "high",
            QualityTier::Standard => "standard",
            QualityTier::Archive => "archive",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality actually recorded for a stored artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionQuality {
    /// Encoded at the high tier.
    High,
    /// Encoded at the standard tier.
    Standard,
    /// Encoded at the archive tier.
    Archive,
    /// Source was below the skip threshold and copied verbatim.
    Skipped,
    /// Encoded output was not smaller; the original was kept.
    Original,
}

impl From<QualityTier> for CompressionQuality {
    fn from(tier: QualityTier) -> Self {
        match tier {
            QualityTier::High => CompressionQuality::High,
            QualityTier::Standard => CompressionQuality::Standard,
            QualityTier::Archive => CompressionQuality::Archive,
        }
    }
}

impl CompressionQuality {
    /// Lowercase name used in stats and catalog entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionQuality::High => "high",
            CompressionQuality::Standard => "standard",
            CompressionQuality::Archive => "archive",
            CompressionQuality::Skipped => "skipped",
            CompressionQuality::Original => "original",
        }
    }
}

/// Failure-analysis hints pre-populated on template stages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageHints {
    /// Likely reasons the stage fails.
    pub possible_causes: Vec<String>,
    /// Fixes worth trying first.
    pub suggested_fixes: Vec<String>,
    /// How to reproduce and inspect a failure.
    pub debug_steps: Vec<String>,
    /// Review priority for failures of this stage.
    pub priority: Priority,
}

/// Ordered sub-step of a test run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStage {
    /// 1-based position in the run.
    pub stage_number: u32,
    /// Human-readable stage name.
    pub name: String,
    /// Pass or fail.
    pub result: StageResult,
    /// Error text for a failed stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Template hints, absent for manifest steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<StageHints>,
}

impl TestStage {
    /// True for a failed stage.
    pub fn failed(&self) -> bool {
        self.result == StageResult::Fail
    }
}

/// Classification and provenance derived for one recording before it is placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    /// Path relative to the input root with separators folded.
    pub video_id: VideoId,
    /// File name as discovered.
    pub original_file_name: String,
    /// Product module (`games`, `content`, ...).
    pub module: ModuleName,
    /// Feature within the module.
    pub feature: FeatureName,
    /// Overall test outcome.
    pub result: TestResult,
    /// Version label, `v1.0.0` unless given.
    pub version: VersionLabel,
    /// Sequence within a day, `001` unless given.
    pub sequence: String,
    /// Weakest confidence across the classified fields.
    pub confidence: Confidence,
    /// Mirror of `confidence == Defaulted` for reporting.
    pub unmapped: bool,
    /// Browser project that produced the recording.
    pub browser: BrowserName,
    /// Test title used for the archive name.
    pub title: String,
    /// Companion trace archive, when the manifest names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_path: Option<PathBuf>,
    /// When the test ran.
    pub test_date: DateTime<Utc>,
    /// Test duration from the manifest, 0 when unknown.
    pub duration_ms: u64,
    /// Size of the source recording.
    pub original_size_bytes: u64,
    /// Where the recording was discovered.
    pub source_path: PathBuf,
    /// Review priority derived from result and module.
    pub priority: Priority,
    /// Ordered stages from the manifest or the module template.
    pub stages: Vec<TestStage>,
    /// First error reported by the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ArtifactMetadata {
    /// Stages that failed, in order.
    pub fn failed_stages(&self) -> impl Iterator<Item = &TestStage> {
        self.stages.iter().filter(|stage| stage.failed())
    }

    /// Stages that passed.
    pub fn passed_stage_count(&self) -> usize {
        self.stages.iter().filter(|stage| !stage.failed()).count()
    }
}

/// Where an artifact ended up in the archive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivePlacement {
    /// Archived recording.
    pub archive_path: PathBuf,
    /// Archived trace, when one was copied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_archive_path: Option<PathBuf>,
}

/// Measured result of one compression decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOutcome {
    /// Source size in bytes.
    pub original_size: u64,
    /// Stored size in bytes.
    pub compressed_size: u64,
    /// Size reduction in percent.
    pub ratio_pct: f64,
    /// Saved space in decimal MB.
    #[serde(rename = "spaceSavedMB")]
    pub space_saved_mb: f64,
    /// Wall time of the decision.
    pub elapsed_seconds: f64,
    /// Quality recorded for the stored copy.
    pub quality: CompressionQuality,
}

/// One fully processed recording.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    /// Derived classification.
    #[serde(flatten)]
    pub metadata: ArtifactMetadata,
    /// Archived recording.
    pub archive_path: PathBuf,
    /// Archived trace, when one was copied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_archive_path: Option<PathBuf>,
    /// Compressed copy.
    pub compressed_path: PathBuf,
    /// Stored size in bytes.
    pub compressed_size_bytes: u64,
    /// Size reduction in percent.
    pub compression_ratio_pct: f64,
    /// Quality recorded for the stored copy.
    pub compression_quality: CompressionQuality,
}

impl ArtifactRecord {
    /// Combine derived metadata with where it was placed and how it compressed.
    pub fn assemble(
        metadata: ArtifactMetadata,
        placement: ArchivePlacement,
        compressed_path: PathBuf,
        outcome: &CompressionOutcome,
    ) -> Self {
        Self {
            metadata,
            archive_path: placement.archive_path,
            trace_archive_path: placement.trace_archive_path,
            compressed_path,
            compressed_size_bytes: outcome.compressed_size,
            compression_ratio_pct: outcome.ratio_pct,
            compression_quality: outcome.quality,
        }
    }

    /// Catalog key.
    pub fn video_id(&self) -> &str {
        &self.metadata.video_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_tokens_cover_runner_spellings() {
        assert_eq!(TestResult::from_token("fail"), Some(TestResult::Failure));
        assert_eq!(TestResult::from_token("PASSED"), Some(TestResult::Success));
        assert_eq!(TestResult::from_token("timedOut"), Some(TestResult::Failure));
        assert_eq!(TestResult::from_token("skipped"), None);
    }

    #[test]
    fn weakest_confidence_wins() {
        let fields = [Confidence::Classified, Confidence::Defaulted, Confidence::Inferred];
        assert_eq!(fields.iter().copied().min(), Some(Confidence::Defaulted));
        assert!(Confidence::Defaulted.is_unmapped());
        assert!(!Confidence::Inferred.is_unmapped());
    }

    #[test]
    fn priority_prefers_failures_then_module() {
        assert_eq!(
            Priority::for_artifact("system", TestResult::Failure),
            Priority::High
        );
        assert_eq!(Priority::for_artifact("games", TestResult::Success), Priority::High);
        assert_eq!(
            Priority::for_artifact("content", TestResult::Success),
            Priority::Medium
        );
        assert_eq!(
            Priority::for_artifact("file-space", TestResult::Success),
            Priority::Low
        );
    }

    #[test]
    fn quality_serializes_lowercase() {
        let json = serde_json::to_string(&CompressionQuality::Original).unwrap();
        assert_eq!(json, "\"original\"");
        let tier: QualityTier = serde_json::from_str("\"archive\"").unwrap();
        assert_eq!(CompressionQuality::from(tier), CompressionQuality::Archive);
    }
}
