#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Archive Organizer: canonical destination paths and collision-safe copies.
pub mod archive;
/// Metadata Deriver: filename parsing, keyword rules, and stage templates.
pub mod classify;
/// Command-line entry used by the `process_test_videos` binary.
pub mod cli;
/// Compression decisions and the external encoder.
pub mod compression;
/// Pipeline, compression, and monitor configuration.
pub mod config;
/// Centralized constants grouped by concern.
pub mod constants;
/// Artifact metadata, records, and shared enums.
pub mod data;
mod errors;
mod hash;
/// Manifest Correlator for Playwright-style result files.
pub mod manifest;
/// Aggregate metrics helpers.
pub mod metrics;
/// Monitor mode polling loop.
pub mod monitor;
/// Batch Orchestrator.
pub mod orchestrator;
/// Batch run reports and recommendations.
pub mod report;
/// JSON-backed stores and the run lock.
pub mod stores;
/// Input transports (filesystem discovery and path helpers).
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Name sanitization and text normalization helpers.
pub mod utils;

pub use archive::ArchiveOrganizer;
pub use classify::MetadataDeriver;
pub use compression::{CompressionEngine, Encoder, FfmpegEncoder, smart_tier};
pub use config::{CompressionConfig, MonitorConfig, Overrides, PipelineConfig, QualityProfile};
pub use data::{
    ArchivePlacement, ArtifactMetadata, ArtifactRecord, CompressionOutcome, CompressionQuality,
    Confidence, Priority, QualityTier, StageResult, TestResult, TestStage,
};
pub use errors::PipelineError;
pub use manifest::{ManifestEntry, ManifestIndex, correlate};
pub use monitor::{Monitor, MonitorSummary};
pub use orchestrator::BatchOrchestrator;
pub use report::BatchReport;
pub use stores::{
    ArtifactQuery, ArtifactStores, CatalogStore, CompressionStatsStore, FailureAnalysisStore,
    MemoryStore, PatternIndex, RunLock,
};
pub use types::{BrowserName, FeatureName, MemoryId, ModuleName, PatternId, VersionLabel, VideoId};
