//! Upsert-by-id registry of the latest state of every artifact.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::data::{ArtifactRecord, CompressionQuality, Priority, TestResult};
use crate::errors::PipelineError;
use crate::metrics::{ModuleStats, breakdown, bytes_to_mb, success_rate};
use crate::stores::json_file::{JsonFileStore, StoreDocument};
use crate::stores::{ArtifactQuery, Queryable};
use crate::types::{BrowserName, FeatureName, ModuleName, VersionLabel, VideoId};

/// Latest known state of one artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Catalog key.
    pub video_id: VideoId,
    /// Test title.
    pub title: String,
    /// Module.
    pub module: ModuleName,
    /// Feature.
    pub feature: FeatureName,
    /// Test outcome.
    pub result: TestResult,
    /// Classified from defaults.
    pub unmapped: bool,
    /// Browser project.
    pub browser: BrowserName,
    /// Version label.
    pub version: VersionLabel,
    /// When the test ran.
    pub test_date: DateTime<Utc>,
    /// Source recording.
    pub source_path: PathBuf,
    /// Archived recording.
    pub archive_path: PathBuf,
    /// Archived trace, when one was copied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_path: Option<PathBuf>,
    /// Compressed copy.
    pub compressed_path: PathBuf,
    /// Source size in bytes.
    pub original_size: u64,
    /// Stored size in bytes.
    pub compressed_size: u64,
    /// Size reduction in percent.
    pub compression_ratio: f64,
    /// Quality recorded for the compressed copy.
    pub compression_quality: CompressionQuality,
    /// Review priority.
    pub priority: Priority,
}

impl From<&ArtifactRecord> for CatalogEntry {
    fn from(record: &ArtifactRecord) -> Self {
        let meta = &record.metadata;
        Self {
            video_id: meta.video_id.clone(),
            title: meta.title.clone(),
            module: meta.module.clone(),
            feature: meta.feature.clone(),
            result: meta.result,
            unmapped: meta.unmapped,
            browser: meta.browser.clone(),
            version: meta.version.clone(),
            test_date: meta.test_date,
            source_path: meta.source_path.clone(),
            archive_path: record.archive_path.clone(),
            trace_path: record.trace_archive_path.clone(),
            compressed_path: record.compressed_path.clone(),
            original_size: meta.original_size_bytes,
            compressed_size: record.compressed_size_bytes,
            compression_ratio: record.compression_ratio_pct,
            compression_quality: record.compression_quality,
            priority: meta.priority,
        }
    }
}

impl Queryable for CatalogEntry {
    fn module(&self) -> &str {
        &self.module
    }

    fn feature(&self) -> &str {
        &self.feature
    }

    fn result(&self) -> TestResult {
        self.result
    }

    fn searchable_text(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.video_id.as_str()]
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.test_date
    }
}

/// Aggregate over every catalog entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    /// Entries in the catalog.
    pub total_tests: u64,
    /// Successful entries.
    pub success_tests: u64,
    /// Failed entries.
    pub failure_tests: u64,
    /// Success share in percent.
    pub success_rate: f64,
    /// Entries classified from defaults.
    pub unmapped_tests: u64,
    /// Outcomes per module.
    pub module_stats: BTreeMap<ModuleName, ModuleStats>,
    /// Sum of source sizes, decimal MB.
    #[serde(rename = "totalOriginalSizeMB")]
    pub total_original_size_mb: f64,
    /// Sum of stored sizes, decimal MB.
    #[serde(rename = "totalCompressedSizeMB")]
    pub total_compressed_size_mb: f64,
    /// Original minus compressed, decimal MB.
    #[serde(rename = "totalSpaceSavedMB")]
    pub total_space_saved_mb: f64,
}

impl CatalogStats {
    /// Recompute the aggregate from `entries`.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> Self {
        let entries: Vec<&CatalogEntry> = entries.into_iter().collect();
        let total_tests = entries.len() as u64;
        let success_tests = entries
            .iter()
            .filter(|entry| entry.result == TestResult::Success)
            .count() as u64;
        let original: u64 = entries.iter().map(|entry| entry.original_size).sum();
        let compressed: u64 = entries.iter().map(|entry| entry.compressed_size).sum();
        Self {
            total_tests,
            success_tests,
            failure_tests: total_tests - success_tests,
            success_rate: success_rate(success_tests, total_tests),
            unmapped_tests: entries.iter().filter(|entry| entry.unmapped).count() as u64,
            module_stats: breakdown(
                entries.iter().map(|entry| (entry.module.as_str(), entry.result)),
            ),
            total_original_size_mb: bytes_to_mb(original),
            total_compressed_size_mb: bytes_to_mb(compressed),
            total_space_saved_mb: bytes_to_mb(original.saturating_sub(compressed)),
        }
    }
}

/// On-disk catalog document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogDocument {
    /// Entries keyed by video id, in first-insert order.
    pub tests: IndexMap<VideoId, CatalogEntry>,
    /// Aggregate recomputed on every write.
    pub stats: CatalogStats,
    /// Time of the last write.
    pub last_updated: Option<DateTime<Utc>>,
}

impl StoreDocument for CatalogDocument {
    const NAME: &'static str = "catalog";

    fn recompute(&mut self) {
        self.stats = CatalogStats::from_entries(self.tests.values());
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_updated = Some(at);
    }
}

/// Latest known state per `videoId`. Reprocessing replaces in place.
#[derive(Clone, Debug)]
pub struct CatalogStore {
    file: JsonFileStore<CatalogDocument>,
}

impl CatalogStore {
    /// Catalog stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFileStore::new(path),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the catalog; a missing file is an empty catalog.
    pub fn load(&self) -> Result<CatalogDocument, PipelineError> {
        self.file.load()
    }

    /// Insert or replace the entry for `record.video_id()`; returns true when it replaced one.
    pub fn upsert(&self, record: &ArtifactRecord) -> Result<bool, PipelineError> {
        let entry = CatalogEntry::from(record);
        self.file
            .mutate(|doc| doc.tests.insert(entry.video_id.clone(), entry).is_some())
    }

    /// Entry for `video_id`, if any.
    pub fn get(&self, video_id: &str) -> Result<Option<CatalogEntry>, PipelineError> {
        Ok(self.load()?.tests.shift_remove(video_id))
    }

    /// Entries matching `query`.
    pub fn query(&self, query: &ArtifactQuery) -> Result<Vec<CatalogEntry>, PipelineError> {
        Ok(self
            .load()?
            .tests
            .into_values()
            .filter(|entry| query.matches(entry))
            .collect())
    }
}
