//! Append-only compression outcomes with recomputed totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::data::{CompressionOutcome, CompressionQuality};
use crate::errors::PipelineError;
use crate::metrics::{bytes_to_mb, mean, reduction_pct};
use crate::stores::json_file::{JsonFileStore, StoreDocument};
use crate::utils::{round1, round2};

/// One logged compression decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionEntry {
    /// Recording that was compressed.
    pub input_path: PathBuf,
    /// Where the compressed copy went.
    pub output_path: PathBuf,
    /// Sizes, ratio, and quality.
    #[serde(flatten)]
    pub outcome: CompressionOutcome,
    /// When it was logged.
    pub timestamp: DateTime<Utc>,
}

/// Totals over every logged compression.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionTotals {
    /// Logged compressions.
    pub total_compressions: u64,
    /// Sum of source sizes, decimal MB.
    #[serde(rename = "totalOriginalSizeMB")]
    pub total_original_size_mb: f64,
    /// Sum of stored sizes, decimal MB.
    #[serde(rename = "totalCompressedSizeMB")]
    pub total_compressed_size_mb: f64,
    /// Original minus compressed, decimal MB.
    #[serde(rename = "totalSpaceSavedMB")]
    pub total_space_saved_mb: f64,
    /// Mean size reduction in percent.
    pub average_compression_ratio: f64,
    /// Mean seconds per compression.
    pub average_compression_time: f64,
    /// Saved share of the original bytes, in percent.
    pub space_saving_percentage: f64,
}

impl CompressionTotals {
    /// Recompute totals from `entries`.
    pub fn from_entries(entries: &[CompressionEntry]) -> Self {
        let original: u64 = entries.iter().map(|e| e.outcome.original_size).sum();
        let compressed: u64 = entries.iter().map(|e| e.outcome.compressed_size).sum();
        let ratios: Vec<f64> = entries.iter().map(|e| e.outcome.ratio_pct).collect();
        let times: Vec<f64> = entries.iter().map(|e| e.outcome.elapsed_seconds).collect();
        Self {
            total_compressions: entries.len() as u64,
            total_original_size_mb: bytes_to_mb(original),
            total_compressed_size_mb: bytes_to_mb(compressed),
            total_space_saved_mb: bytes_to_mb(original.saturating_sub(compressed)),
            average_compression_ratio: round1(mean(&ratios)),
            average_compression_time: round2(mean(&times)),
            space_saving_percentage: reduction_pct(original, compressed),
        }
    }
}

/// On-disk compression stats document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressionStatsDocument {
    /// Append-only log.
    pub compressions: Vec<CompressionEntry>,
    /// Totals recomputed on every write.
    pub total_stats: CompressionTotals,
    /// Count per recorded quality.
    pub quality_stats: BTreeMap<CompressionQuality, u64>,
    /// Time of the last write.
    pub last_updated: Option<DateTime<Utc>>,
}

impl StoreDocument for CompressionStatsDocument {
    const NAME: &'static str = "compression-stats";

    fn recompute(&mut self) {
        self.total_stats = CompressionTotals::from_entries(&self.compressions);
        let mut quality_stats = BTreeMap::new();
        for entry in &self.compressions {
            *quality_stats.entry(entry.outcome.quality).or_insert(0) += 1;
        }
        self.quality_stats = quality_stats;
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_updated = Some(at);
    }
}

/// Append-only compression stats log.
#[derive(Clone, Debug)]
pub struct CompressionStatsStore {
    file: JsonFileStore<CompressionStatsDocument>,
}

impl CompressionStatsStore {
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
    pub fn load(&self) -> Result<CompressionStatsDocument, PipelineError> {
        self.file.load()
    }

    /// Append one committed outcome.
    pub fn append(
        &self,
        input_path: &Path,
        output_path: &Path,
        outcome: &CompressionOutcome,
    ) -> Result<(), PipelineError> {
        let entry = CompressionEntry {
            input_path: input_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            outcome: outcome.clone(),
            timestamp: Utc::now(),
        };
        self.file.mutate(|doc| doc.compressions.push(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn outcome(original: u64, compressed: u64, quality: CompressionQuality) -> CompressionOutcome {
        CompressionOutcome {
            original_size: original,
            compressed_size: compressed,
            ratio_pct: reduction_pct(original, compressed),
            space_saved_mb: bytes_to_mb(original - compressed),
            elapsed_seconds: 2.0,
            quality,
        }
    }

    #[test]
    fn totals_are_recomputed_from_every_entry() {
        let dir = tempdir().unwrap();
        let store = CompressionStatsStore::new(dir.path().join("compression-stats.json"));
        let a = Path::new("a.webm");
        store
            .append(a, a, &outcome(4_000_000, 1_000_000, CompressionQuality::High))
            .unwrap();
        store
            .append(a, a, &outcome(500_000, 500_000, CompressionQuality::Skipped))
            .unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc.total_stats.total_compressions, 2);
        assert!((doc.total_stats.total_space_saved_mb - 3.0).abs() < 1e-9);
        assert!((doc.total_stats.average_compression_ratio - 37.5).abs() < 1e-9);
        assert_eq!(doc.quality_stats[&CompressionQuality::Skipped], 1);
        assert_eq!(doc.total_stats, CompressionTotals::from_entries(&doc.compressions));
    }
}
