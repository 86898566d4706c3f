//! Batch orchestration: discover, correlate once, then derive → place → compress →
//! record for each artifact inside a per-item error boundary.

use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{info, warn};

use crate::archive::ArchiveOrganizer;
use crate::classify::MetadataDeriver;
use crate::compression::{CompressionEngine, Encoder, FfmpegEncoder};
use crate::config::PipelineConfig;
use crate::data::{ArchivePlacement, ArtifactRecord};
use crate::errors::PipelineError;
use crate::manifest::{ManifestIndex, correlate};
use crate::report::BatchReport;
use crate::stores::{ArtifactStores, CompressionStatsStore, RunLock};
use crate::transport::fs::VideoScanner;

/// Drives one batch: scan, correlate, then derive, place, compress, and record each artifact.
pub struct BatchOrchestrator {
    config: PipelineConfig,
    deriver: MetadataDeriver,
    organizer: ArchiveOrganizer,
    compression: CompressionEngine,
    stores: ArtifactStores,
    shutdown: Arc<AtomicBool>,
}

impl BatchOrchestrator {
    /// Orchestrator using the external encoder named in the config.
    pub fn new(config: PipelineConfig) -> Self {
        let encoder = FfmpegEncoder::from_config(&config.compression);
        Self::with_encoder(config, Box::new(encoder))
    }

    /// Orchestrator with an explicit encoder.
    pub fn with_encoder(config: PipelineConfig, encoder: Box<dyn Encoder>) -> Self {
        let deriver = MetadataDeriver::new(&config.input_dir, config.overrides.clone());
        let organizer = ArchiveOrganizer::new(config.archive_dir(), config.compressed_dir());
        let compression = CompressionEngine::new(
            config.compression.clone(),
            encoder,
            CompressionStatsStore::new(config.compression_stats_path()),
        );
        let stores = ArtifactStores::open(&config);
        Self {
            config,
            deriver,
            organizer,
            compression,
            stores,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned shutdown flag (set by the signal handler).
    pub fn with_shutdown_flag(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Flag checked between artifacts.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Settings the orchestrator was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stores written for every processed artifact.
    pub fn stores(&self) -> &ArtifactStores {
        &self.stores
    }

    /// Engine producing the compressed copies.
    pub fn compression(&self) -> &CompressionEngine {
        &self.compression
    }

    /// Run one batch over the input tree.
    ///
    /// Item-scoped errors are recorded in the report; configuration, lock, and
    /// store errors abort the run. A shutdown request is honoured between items.
    pub fn run_batch(&self) -> Result<BatchReport, PipelineError> {
        self.config.validate()?;
        let lock = RunLock::acquire(&self.config.lock_path(), "batch")?;
        let mut report = BatchReport::new(Utc::now());

        let files = VideoScanner::new(&self.config.input_dir)
            .excluding(self.config.archive_dir())
            .excluding(self.config.compressed_dir())
            .scan()?;
        let manifest = correlate(self.config.manifest_root(), &self.config.manifest_file_name);
        info!(
            files = files.len(),
            manifest_entries = manifest.len(),
            "[videos:batch] starting batch"
        );

        let mut interrupted = false;
        for (idx, path) in files.iter().enumerate() {
            if self.shutdown.load(Ordering::SeqCst) {
                warn!(
                    remaining = files.len() - idx,
                    "[videos:batch] shutdown requested; stopping before next artifact"
                );
                interrupted = true;
                break;
            }
            let started = Instant::now();
            match self.process_one(path, &manifest) {
                Ok(record) => {
                    info!(
                        video_id = %record.video_id(),
                        archive = %record.archive_path.display(),
                        "[videos:batch] processed {}/{}",
                        idx + 1,
                        files.len()
                    );
                    report.record_success(&record, started.elapsed().as_secs_f64());
                }
                Err(err) if err.is_item_scoped() => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "[videos:batch] artifact failed; continuing"
                    );
                    report.record_failure(path, &err);
                }
                Err(err) => return Err(err),
            }
        }

        report.finish(Utc::now(), interrupted);
        if self.config.generate_reports {
            let report_path = report.write_daily(&self.config.reports_dir())?;
            info!(path = %report_path.display(), "[videos:batch] report written");
        }
        if self.config.cleanup {
            cleanup_sources(&report);
        }
        lock.release()?;
        info!(
            total = report.total,
            successful = report.successful,
            failed = report.failed,
            "[videos:batch] batch complete"
        );
        Ok(report)
    }

    /// Full pipeline for one recording.
    ///
    /// Stores are checked before anything is copied. Any failure after placement
    /// discards the archive and compressed copies, and the compression stats
    /// entry is appended only once every other store has the record.
    pub fn process_one(
        &self,
        path: &Path,
        manifest: &ManifestIndex,
    ) -> Result<ArtifactRecord, PipelineError> {
        let meta = self.deriver.derive(path, manifest.get(path))?;
        self.stores.check_readable()?;
        self.compression.stats().load()?;

        let placement = self.organizer.place(&meta)?;
        let compressed_path = self.organizer.compressed_target(&meta, &placement);
        let outcome = match self
            .compression
            .smart_compress(&placement.archive_path, &compressed_path, &meta)
        {
            Ok(outcome) => outcome,
            Err(err) => {
                discard_copies(&placement, &compressed_path);
                return Err(err);
            }
        };
        let record = ArtifactRecord::assemble(meta, placement.clone(), compressed_path, &outcome);
        if let Err(err) = self.stores.record(&record) {
            discard_copies(&placement, &record.compressed_path);
            return Err(err);
        }
        self.compression
            .record_outcome(&record.archive_path, &record.compressed_path, &outcome)?;
        Ok(record)
    }
}

/// Remove the archive and compressed copies of an artifact whose processing
/// failed, so a retry lands on the same name.
fn discard_copies(placement: &ArchivePlacement, compressed_path: &Path) {
    let archived = std::iter::once(placement.archive_path.as_path())
        .chain(placement.trace_archive_path.as_deref());
    for path in archived.chain(std::iter::once(compressed_path)) {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %path.display(),
                error = %err,
                "[videos:batch] could not remove partial copy"
            ),
        }
    }
}

/// Delete the source recording of every processed artifact.
fn cleanup_sources(report: &BatchReport) {
    let mut removed = 0usize;
    for source in report.processed_sources() {
        match fs::remove_file(source) {
            Ok(()) => removed += 1,
            Err(err) => warn!(
                path = %source.display(),
                error = %err,
                "[videos:cleanup] could not remove source"
            ),
        }
    }
    info!(removed, "[videos:cleanup] removed processed sources");
}
