use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::compression::{
    DEFAULT_ENCODER_PROGRAM, DEFAULT_ENCODER_TIMEOUT_SECS, LARGE_FILE_BYTES, SKIP_THRESHOLD_BYTES,
    SMALL_FILE_BYTES, VIDEO_CODEC,
};
use crate::constants::manifest::MANIFEST_FILENAME;
use crate::constants::monitor::{DEFAULT_INTERVAL_SECS, DEFAULT_MAX_RETRIES};
use crate::constants::stores::{
    ARCHIVE_DIR, CATALOG_FILENAME, COMPRESSED_DIR, COMPRESSION_STATS_FILENAME,
    FAILURE_ANALYSIS_FILENAME, LOCK_FILENAME, LOCKS_DIR, MEMORY_DIR, MEMORY_FILENAME,
    METADATA_DIR, PATTERNS_FILENAME, REPORTS_DIR,
};
use crate::data::QualityTier;
use crate::errors::PipelineError;
use crate::types::{FeatureName, ModuleName, VersionLabel};

/// Encoder parameters for one quality tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualityProfile {
    /// Tier this profile encodes.
    pub tier: QualityTier,
    /// Encoder codec name.
    pub codec: String,
    /// Target video bitrate (encoder syntax, e.g. `1M`, `600k`).
    pub bitrate: String,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub framerate: u32,
}

impl QualityProfile {
    /// Built-in profile for `tier`.
    pub fn for_tier(tier: QualityTier) -> Self {
        let (bitrate, width, height, framerate) = match tier {
            QualityTier::High => ("1.5M", 1920, 1080, 30),
            QualityTier::Standard => ("1M", 1280, 720, 24),
            QualityTier::Archive => ("600k", 1280, 720, 15),
        };
        Self {
            tier,
            codec: VIDEO_CODEC.to_string(),
            bitrate: bitrate.to_string(),
            width,
            height,
            framerate,
        }
    }
}

/// Thresholds and encoder settings for the compression decision engine.
#[derive(Clone, Debug)]
pub struct CompressionConfig {
    /// Sources strictly below this size are copied verbatim.
    pub skip_threshold_bytes: u64,
    /// Smart mode picks `high` for sources strictly below this size.
    pub small_file_bytes: u64,
    /// Smart mode picks `archive` for sources strictly above this size.
    pub large_file_bytes: u64,
    /// External encoder program (looked up on `PATH` when not absolute).
    pub encoder_program: PathBuf,
    /// Wall-clock limit for one encoder invocation.
    pub encoder_timeout: Duration,
    /// Profiles for `high`, `standard`, and `archive`.
    pub profiles: [QualityProfile; 3],
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            skip_threshold_bytes: SKIP_THRESHOLD_BYTES,
            small_file_bytes: SMALL_FILE_BYTES,
            large_file_bytes: LARGE_FILE_BYTES,
            encoder_program: PathBuf::from(DEFAULT_ENCODER_PROGRAM),
            encoder_timeout: Duration::from_secs(DEFAULT_ENCODER_TIMEOUT_SECS),
            profiles: [
                QualityProfile::for_tier(QualityTier::High),
                QualityProfile::for_tier(QualityTier::Standard),
                QualityProfile::for_tier(QualityTier::Archive),
            ],
        }
    }
}

impl CompressionConfig {
    /// Profile configured for `tier`.
    pub fn profile(&self, tier: QualityTier) -> &QualityProfile {
        match tier {
            QualityTier::High => &self.profiles[0],
            QualityTier::Standard => &self.profiles[1],
            QualityTier::Archive => &self.profiles[2],
        }
    }

    /// Override the skip threshold.
    pub fn with_skip_threshold(mut self, bytes: u64) -> Self {
        self.skip_threshold_bytes = bytes;
        self
    }

    /// Override the small/large smart-mode size bounds.
    pub fn with_size_bounds(mut self, small_file_bytes: u64, large_file_bytes: u64) -> Self {
        self.small_file_bytes = small_file_bytes;
        self.large_file_bytes = large_file_bytes;
        self
    }

    /// Override the encoder program.
    pub fn with_encoder_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.encoder_program = program.into();
        self
    }

    /// Override the encoder timeout.
    pub fn with_encoder_timeout(mut self, timeout: Duration) -> Self {
        self.encoder_timeout = timeout;
        self
    }

    /// Reject thresholds that would make the size rules contradict each other.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.small_file_bytes > self.large_file_bytes {
            return Err(PipelineError::Configuration(format!(
                "small file bound ({}) must not exceed large file bound ({})",
                self.small_file_bytes, self.large_file_bytes
            )));
        }
        if self.encoder_timeout.is_zero() {
            return Err(PipelineError::Configuration(
                "encoder timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Batch-wide classification overrides (CLI flags or `MODULE`/`FEATURE`/`VERSION`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Module forced onto every artifact.
    pub module: Option<ModuleName>,
    /// Feature forced onto every artifact.
    pub feature: Option<FeatureName>,
    /// Version forced onto every artifact.
    pub version: Option<VersionLabel>,
}

impl Overrides {
    /// True when no field is forced.
    pub fn is_empty(&self) -> bool {
        self.module.is_none() && self.feature.is_none() && self.version.is_none()
    }
}

/// Polling behavior for monitor mode.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Sleep between polls.
    pub interval: Duration,
    /// Consecutive failed batches tolerated before giving up.
    pub max_retries: u32,
    /// Stop after this many polls (unbounded when `None`).
    pub max_polls: Option<u64>,
    /// Print each batch summary to stdout.
    pub print_summaries: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            max_polls: None,
            print_summaries: true,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Directory walked recursively for `*.webm` recordings.
    pub input_dir: PathBuf,
    /// Directory holding the test-run manifest (defaults to `input_dir`).
    pub test_results_dir: Option<PathBuf>,
    /// Manifest filename inside `test_results_dir`.
    pub manifest_file_name: String,
    /// Root of the archive layout and the JSON stores.
    pub archive_root: PathBuf,
    /// Classification overrides applied to every artifact.
    pub overrides: Overrides,
    /// Whether the batch report file is written.
    pub generate_reports: bool,
    /// Whether source recordings are deleted after successful processing.
    pub cleanup: bool,
    /// Compression thresholds and encoder settings.
    pub compression: CompressionConfig,
}

impl PipelineConfig {
    /// Create a config reading from `input_dir` and writing under `archive_root`.
    pub fn new(input_dir: impl Into<PathBuf>, archive_root: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            test_results_dir: None,
            manifest_file_name: MANIFEST_FILENAME.to_string(),
            archive_root: archive_root.into(),
            overrides: Overrides::default(),
            generate_reports: true,
            cleanup: false,
            compression: CompressionConfig::default(),
        }
    }

    /// Use a separate directory for the manifest.
    pub fn with_test_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.test_results_dir = Some(dir.into());
        self
    }

    /// Set classification overrides.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Enable or disable the batch report file.
    pub fn with_reports(mut self, generate_reports: bool) -> Self {
        self.generate_reports = generate_reports;
        self
    }

    /// Enable or disable source cleanup.
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Replace compression settings.
    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    /// Directory the manifest is read from.
    pub fn manifest_root(&self) -> &Path {
        self.test_results_dir.as_deref().unwrap_or(&self.input_dir)
    }

    /// `{root}/archive`.
    pub fn archive_dir(&self) -> PathBuf {
        self.archive_root.join(ARCHIVE_DIR)
    }

    /// `{root}/compressed`.
    pub fn compressed_dir(&self) -> PathBuf {
        self.archive_root.join(COMPRESSED_DIR)
    }

    /// `{root}/reports`.
    pub fn reports_dir(&self) -> PathBuf {
        self.archive_root.join(REPORTS_DIR)
    }

    /// `{root}/locks/pipeline.lock`.
    pub fn lock_path(&self) -> PathBuf {
        self.archive_root.join(LOCKS_DIR).join(LOCK_FILENAME)
    }

    /// `{root}/metadata/test-catalog.json`.
    pub fn catalog_path(&self) -> PathBuf {
        self.archive_root.join(METADATA_DIR).join(CATALOG_FILENAME)
    }

    /// `{root}/metadata/compression-stats.json`.
    pub fn compression_stats_path(&self) -> PathBuf {
        self.archive_root
            .join(METADATA_DIR)
            .join(COMPRESSION_STATS_FILENAME)
    }

    /// `{root}/local-memory/video-memories.json`.
    pub fn memory_path(&self) -> PathBuf {
        self.archive_root.join(MEMORY_DIR).join(MEMORY_FILENAME)
    }

    /// `{root}/local-memory/test-patterns.json`.
    pub fn patterns_path(&self) -> PathBuf {
        self.archive_root.join(MEMORY_DIR).join(PATTERNS_FILENAME)
    }

    /// `{root}/local-memory/failure-analysis.json`.
    pub fn failure_analysis_path(&self) -> PathBuf {
        self.archive_root
            .join(MEMORY_DIR)
            .join(FAILURE_ANALYSIS_FILENAME)
    }

    /// Fail fast on configuration errors before any artifact is touched.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.input_dir.is_dir() {
            return Err(PipelineError::Configuration(format!(
                "input directory does not exist: {}",
                self.input_dir.display()
            )));
        }
        self.compression.validate()
    }
}
