//! Compression decisions: skip tiny sources, encode the rest, and never keep an
//! encode that is not smaller than its source.

pub mod encoder;

use std::fs;
use std::path::Path;
use std::time::Instant;
use tempfile::Builder;
use tracing::{debug, info};

use crate::config::CompressionConfig;
use crate::constants::artifacts::VIDEO_EXTENSION;
use crate::data::{ArtifactMetadata, CompressionOutcome, CompressionQuality, QualityTier, TestResult};
use crate::errors::PipelineError;
use crate::metrics::{bytes_to_mb, reduction_pct};
use crate::stores::CompressionStatsStore;
use crate::transport::fs::{ensure_parent_dir, file_size};
use crate::utils::round2;

pub use encoder::{Encoder, FfmpegEncoder};

/// Smart-mode tier: result/module rule first, then size rules (last applied wins).
///
/// ```
/// use test_video_archiver::compression::smart_tier;
/// use test_video_archiver::config::CompressionConfig;
/// use test_video_archiver::data::{QualityTier, TestResult};
///
/// let config = CompressionConfig::default();
/// assert_eq!(smart_tier(&config, TestResult::Failure, "games", 2_000_000), QualityTier::High);
/// assert_eq!(smart_tier(&config, TestResult::Success, "games", 60_000_000), QualityTier::Archive);
/// ```
pub fn smart_tier(
    config: &CompressionConfig,
    result: TestResult,
    module: &str,
    size_bytes: u64,
) -> QualityTier {
    let mut tier = if result == TestResult::Failure {
        QualityTier::High
    } else if module == "system" {
        QualityTier::Archive
    } else {
        QualityTier::Standard
    };
    if size_bytes > config.large_file_bytes {
        tier = QualityTier::Archive;
    }
    if size_bytes < config.small_file_bytes {
        tier = QualityTier::High;
    }
    tier
}

/// Owns the encoder and the compression stats log.
pub struct CompressionEngine {
    config: CompressionConfig,
    encoder: Box<dyn Encoder>,
    stats: CompressionStatsStore,
}

impl CompressionEngine {
    /// Engine writing outcomes to `stats`.
    pub fn new(config: CompressionConfig, encoder: Box<dyn Encoder>, stats: CompressionStatsStore) -> Self {
        Self {
            config,
            encoder,
            stats,
        }
    }

    /// Thresholds and quality profiles.
    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Compression stats log.
    pub fn stats(&self) -> &CompressionStatsStore {
        &self.stats
    }

    /// Tier smart mode would pick for `meta`.
    pub fn choose_tier(&self, meta: &ArtifactMetadata) -> QualityTier {
        smart_tier(&self.config, meta.result, &meta.module, meta.original_size_bytes)
    }

    /// Compress with the tier chosen from `meta`.
    pub fn smart_compress(
        &self,
        source: &Path,
        target: &Path,
        meta: &ArtifactMetadata,
    ) -> Result<CompressionOutcome, PipelineError> {
        let tier = self.choose_tier(meta);
        debug!(
            video_id = %meta.video_id,
            tier = %tier,
            "[videos:compress] smart tier selected"
        );
        self.compress(source, target, tier)
    }

    /// Write a compressed (or verbatim) copy of `source` to `target`.
    ///
    /// The outcome is not logged to the stats store; call [`Self::record_outcome`]
    /// once the artifact has been committed everywhere else.
    pub fn compress(
        &self,
        source: &Path,
        target: &Path,
        tier: QualityTier,
    ) -> Result<CompressionOutcome, PipelineError> {
        let original_size = file_size(source)?;
        ensure_parent_dir(target)?;
        let started = Instant::now();

        let (compressed_size, quality) = if original_size < self.config.skip_threshold_bytes {
            fs::copy(source, target)?;
            (original_size, CompressionQuality::Skipped)
        } else {
            self.encode_or_keep_original(source, target, tier, original_size)?
        };

        let outcome = CompressionOutcome {
            original_size,
            compressed_size,
            ratio_pct: reduction_pct(original_size, compressed_size),
            space_saved_mb: bytes_to_mb(original_size.saturating_sub(compressed_size)),
            elapsed_seconds: round2(started.elapsed().as_secs_f64()),
            quality,
        };
        info!(
            source = %source.display(),
            quality = quality.as_str(),
            ratio_pct = outcome.ratio_pct,
            "[videos:compress] {} -> {} bytes",
            original_size,
            compressed_size
        );
        Ok(outcome)
    }

    /// Append a committed outcome to the compression stats log.
    pub fn record_outcome(
        &self,
        source: &Path,
        target: &Path,
        outcome: &CompressionOutcome,
    ) -> Result<(), PipelineError> {
        self.stats.append(source, target, outcome)
    }

    fn encode_or_keep_original(
        &self,
        source: &Path,
        target: &Path,
        tier: QualityTier,
        original_size: u64,
    ) -> Result<(u64, CompressionQuality), PipelineError> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        let scratch = Builder::new()
            .prefix(".encoding-")
            .suffix(&format!(".{VIDEO_EXTENSION}"))
            .tempfile_in(parent)?;
        self.encoder
            .encode(source, scratch.path(), self.config.profile(tier))?;
        let encoded_size = file_size(scratch.path())?;
        if encoded_size < original_size {
            scratch.persist(target).map_err(|err| err.error)?;
            Ok((encoded_size, CompressionQuality::from(tier)))
        } else {
            debug!(
                source = %source.display(),
                encoded_size,
                original_size,
                "[videos:compress] encode not smaller; keeping original"
            );
            drop(scratch);
            fs::copy(source, target)?;
            Ok((original_size, CompressionQuality::Original))
        }
    }
}
