//! Batch report, threshold recommendations, and the human-readable summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::constants::report::{
    MIN_MODULE_SUCCESS_RATE, MIN_PROCESSING_SUCCESS_RATE, REPORT_FILENAME_PREFIX,
    SLOW_ITEM_SECONDS,
};
use crate::data::{ArtifactRecord, CompressionQuality, Priority, TestResult};
use crate::errors::PipelineError;
use crate::metrics::{ModuleStats, breakdown, mean, success_rate};
use crate::stores::json_file::save_document;
use crate::types::{FeatureName, Message, ModuleName, VideoId};
use crate::utils::round2;

/// Coarse grouping of per-item errors for the repeated-error recommendation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing file.
    NotFound,
    /// Permission denied.
    Permission,
    /// Encoder failure or timeout.
    Compression,
    /// Unreadable data or store document.
    Parse,
    /// Anything else.
    Other,
}

impl ErrorCategory {
    /// Category of an item error.
    pub fn of(err: &PipelineError) -> Self {
        match err {
            PipelineError::Io(io) => match io.kind() {
                ErrorKind::NotFound => ErrorCategory::NotFound,
                ErrorKind::PermissionDenied => ErrorCategory::Permission,
                ErrorKind::InvalidData => ErrorCategory::Parse,
                _ => ErrorCategory::Other,
            },
            PipelineError::Encoder { .. } | PipelineError::EncoderTimeout { .. } => {
                ErrorCategory::Compression
            }
            PipelineError::Store { .. } => ErrorCategory::Parse,
            _ => ErrorCategory::Other,
        }
    }

    /// Snake-case name used in recommendations.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Compression => "compression",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Other => "other",
        }
    }
}

/// One artifact that failed inside the batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    /// Source recording.
    pub file: PathBuf,
    /// Error text.
    pub error: Message,
    /// Grouping used by the repeated-error recommendation.
    pub category: ErrorCategory,
}

/// One artifact processed successfully.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedItem {
    /// Catalog key.
    pub video_id: VideoId,
    /// Source recording.
    pub source_path: PathBuf,
    /// Archived copy.
    pub archive_path: PathBuf,
    /// Derived module.
    pub module: ModuleName,
    /// Derived feature.
    pub feature: FeatureName,
    /// Test outcome.
    pub result: TestResult,
    /// Classification fell back to defaults.
    pub unmapped: bool,
    /// Quality recorded for the compressed copy.
    pub compression_quality: CompressionQuality,
    /// Wall time spent on the artifact.
    pub processing_seconds: f64,
}

/// What a recommendation is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Overall processing success rate.
    Quality,
    /// Repeated error category.
    ErrorPattern,
    /// Slow processing.
    Performance,
    /// Low test success rate in a module.
    ModuleQuality,
    /// Unmapped artifacts.
    Classification,
}

/// Follow-up suggested by the batch results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Serialized as `type`.
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    /// Urgency of the follow-up.
    pub priority: Priority,
    /// Human-readable advice.
    pub message: Message,
}

/// Outcome of one batch run, written as the daily report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Batch start time.
    pub started_at: DateTime<Utc>,
    /// Unset until [`BatchReport::finish`].
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall time of the whole batch.
    pub elapsed_seconds: f64,
    /// Artifacts attempted.
    pub total: u64,
    /// Artifacts processed without error.
    pub successful: u64,
    /// Artifacts that failed.
    pub failed: u64,
    /// Share of artifacts processed without error.
    pub success_rate: f64,
    /// Test outcomes of processed artifacts by module.
    pub module_stats: BTreeMap<ModuleName, ModuleStats>,
    /// Test outcomes of processed artifacts by feature.
    pub feature_stats: BTreeMap<FeatureName, ModuleStats>,
    /// Processed artifacts classified from defaults.
    pub unmapped_count: u64,
    /// Mean wall time per processed artifact.
    pub average_processing_seconds: f64,
    /// Stopped early on a shutdown request.
    pub interrupted: bool,
    /// Artifacts processed, in order.
    pub processed: Vec<ProcessedItem>,
    /// Artifacts that failed, in order.
    pub errors: Vec<ItemError>,
    /// Follow-ups derived from the totals.
    pub recommendations: Vec<Recommendation>,
}

impl BatchReport {
    /// Empty report for a batch starting at `started_at`.
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            elapsed_seconds: 0.0,
            total: 0,
            successful: 0,
            failed: 0,
            success_rate: 0.0,
            module_stats: BTreeMap::new(),
            feature_stats: BTreeMap::new(),
            unmapped_count: 0,
            average_processing_seconds: 0.0,
            interrupted: false,
            processed: Vec::new(),
            errors: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// Add a processed artifact.
    pub fn record_success(&mut self, record: &ArtifactRecord, processing_seconds: f64) {
        let meta = &record.metadata;
        self.processed.push(ProcessedItem {
            video_id: meta.video_id.clone(),
            source_path: meta.source_path.clone(),
            archive_path: record.archive_path.clone(),
            module: meta.module.clone(),
            feature: meta.feature.clone(),
            result: meta.result,
            unmapped: meta.unmapped,
            compression_quality: record.compression_quality,
            processing_seconds: round2(processing_seconds),
        });
    }

    /// Add a failed artifact.
    pub fn record_failure(&mut self, file: &Path, err: &PipelineError) {
        self.errors.push(ItemError {
            file: file.to_path_buf(),
            error: err.to_string(),
            category: ErrorCategory::of(err),
        });
    }

    /// Compute totals and recommendations. Safe to call more than once.
    pub fn finish(&mut self, finished_at: DateTime<Utc>, interrupted: bool) {
        self.finished_at = Some(finished_at);
        self.interrupted = interrupted;
        self.elapsed_seconds = round2(
            (finished_at - self.started_at)
                .to_std()
                .map(|elapsed| elapsed.as_secs_f64())
                .unwrap_or(0.0),
        );
        self.successful = self.processed.len() as u64;
        self.failed = self.errors.len() as u64;
        self.total = self.successful + self.failed;
        self.success_rate = success_rate(self.successful, self.total);
        self.module_stats = breakdown(
            self.processed
                .iter()
                .map(|item| (item.module.as_str(), item.result)),
        );
        self.feature_stats = breakdown(
            self.processed
                .iter()
                .map(|item| (item.feature.as_str(), item.result)),
        );
        self.unmapped_count = self.processed.iter().filter(|item| item.unmapped).count() as u64;
        let timings: Vec<f64> = self
            .processed
            .iter()
            .map(|item| item.processing_seconds)
            .collect();
        self.average_processing_seconds = round2(mean(&timings));
        self.recommendations = recommend(self);
    }

    /// Paths of sources that made it into the archive.
    pub fn processed_sources(&self) -> impl Iterator<Item = &Path> {
        self.processed.iter().map(|item| item.source_path.as_path())
    }

    /// Multi-line summary printed after every batch.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Processed {} artifacts: {} successful, {} failed ({:.1}% success) in {:.2}s",
            self.total, self.successful, self.failed, self.success_rate, self.elapsed_seconds
        );
        if self.interrupted {
            let _ = writeln!(out, "Batch interrupted by shutdown signal");
        }
        if !self.module_stats.is_empty() {
            let _ = writeln!(out, "By module:");
            for (module, stats) in &self.module_stats {
                let _ = writeln!(
                    out,
                    "  {module}: {} tests, {} passed, {} failed ({:.1}%)",
                    stats.total,
                    stats.success,
                    stats.failure,
                    stats.success_rate()
                );
            }
        }
        if self.unmapped_count > 0 {
            let _ = writeln!(out, "Unmapped artifacts: {}", self.unmapped_count);
        }
        if !self.errors.is_empty() {
            let _ = writeln!(out, "Errors:");
            for item in &self.errors {
                let _ = writeln!(out, "  {}: {}", item.file.display(), item.error);
            }
        }
        if !self.recommendations.is_empty() {
            let _ = writeln!(out, "Recommendations:");
            for rec in &self.recommendations {
                let _ = writeln!(out, "  [{:?}] {}", rec.priority, rec.message);
            }
        }
        out
    }

    /// Write `reports_dir/batch-processing-YYYY-MM-DD.json`.
    pub fn write_daily(&self, reports_dir: &Path) -> Result<PathBuf, PipelineError> {
        let date = self.finished_at.unwrap_or(self.started_at).format("%Y-%m-%d");
        let path = reports_dir.join(format!("{REPORT_FILENAME_PREFIX}{date}.json"));
        save_document(&path, "report", self)?;
        Ok(path)
    }
}

fn recommend(report: &BatchReport) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    if report.total > 0 && report.success_rate < MIN_PROCESSING_SUCCESS_RATE {
        recs.push(Recommendation {
            kind: RecommendationKind::Quality,
            priority: Priority::High,
            message: format!(
                "processing success rate {:.1}% is below {MIN_PROCESSING_SUCCESS_RATE}%; investigate failures",
                report.success_rate
            ),
        });
    }

    let mut categories: BTreeMap<ErrorCategory, u64> = BTreeMap::new();
    for item in &report.errors {
        *categories.entry(item.category).or_insert(0) += 1;
    }
    for (category, count) in categories.into_iter().filter(|(_, count)| *count > 1) {
        recs.push(Recommendation {
            kind: RecommendationKind::ErrorPattern,
            priority: Priority::Medium,
            message: format!("{count} {} errors in this batch; look for a shared cause", category.as_str()),
        });
    }

    if report.average_processing_seconds > SLOW_ITEM_SECONDS {
        recs.push(Recommendation {
            kind: RecommendationKind::Performance,
            priority: Priority::Medium,
            message: format!(
                "average processing time {:.1}s exceeds {SLOW_ITEM_SECONDS}s; consider a faster quality tier",
                report.average_processing_seconds
            ),
        });
    }

    for (module, stats) in &report.module_stats {
        if stats.success_rate() < MIN_MODULE_SUCCESS_RATE {
            recs.push(Recommendation {
                kind: RecommendationKind::ModuleQuality,
                priority: Priority::Medium,
                message: format!(
                    "module {module} passes only {:.1}% of tests; review recent changes",
                    stats.success_rate()
                ),
            });
        }
    }

    if report.unmapped_count > 0 {
        recs.push(Recommendation {
            kind: RecommendationKind::Classification,
            priority: Priority::Low,
            message: format!(
                "{} artifacts were classified from defaults; name recordings DATE_MODULE_FEATURE_RESULT or provide a manifest",
                report.unmapped_count
            ),
        });
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_record;
    use chrono::{Duration, TimeZone};
    use std::io;

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn finish_counts_items_and_recommends() {
        let mut report = BatchReport::new(started());
        report.record_success(&sample_record("a", "games", "match", TestResult::Success), 1.0);
        let mut unmapped = sample_record("b", "games", "match", TestResult::Failure);
        unmapped.metadata.unmapped = true;
        report.record_success(&unmapped, 2.0);
        let missing = PipelineError::Io(io::Error::new(ErrorKind::NotFound, "gone"));
        report.record_failure(Path::new("/in/c.webm"), &missing);
        report.record_failure(Path::new("/in/d.webm"), &missing);
        report.finish(started() + Duration::seconds(3), false);

        assert_eq!((report.total, report.successful, report.failed), (4, 2, 2));
        assert!((report.success_rate - 50.0).abs() < 1e-9);
        assert!((report.average_processing_seconds - 1.5).abs() < 1e-9);
        assert_eq!(report.unmapped_count, 1);
        assert!((report.elapsed_seconds - 3.0).abs() < 1e-9);
        let kinds: Vec<RecommendationKind> = report.recommendations.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecommendationKind::Quality,
                RecommendationKind::ErrorPattern,
                RecommendationKind::ModuleQuality,
                RecommendationKind::Classification,
            ]
        );
        let summary = report.render_summary();
        assert!(summary.contains("2 successful, 2 failed"));
        assert!(summary.contains("/in/c.webm"));
    }

    #[test]
    fn clean_batches_have_no_recommendations() {
        let mut report = BatchReport::new(started());
        report.finish(started(), false);
        assert_eq!(report.total, 0);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn daily_report_is_named_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = BatchReport::new(started());
        report.finish(started(), true);
        let path = report.write_daily(dir.path()).unwrap();
        assert!(path.ends_with("batch-processing-2024-01-01.json"));
        let raw = std::fs::read_to_string(path).unwrap();
        let parsed: BatchReport = serde_json::from_str(&raw).unwrap();
        assert!(parsed.interrupted);
    }

    #[test]
    fn errors_are_categorized_by_variant() {
        let encoder = PipelineError::EncoderTimeout {
            path: PathBuf::from("a"),
            seconds: 1,
        };
        assert_eq!(ErrorCategory::of(&encoder), ErrorCategory::Compression);
        let denied = PipelineError::Io(io::Error::new(ErrorKind::PermissionDenied, "no"));
        assert_eq!(ErrorCategory::of(&denied), ErrorCategory::Permission);
    }
}
