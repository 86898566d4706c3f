//! Monitor mode: poll the input tree, run a batch whenever recordings appear,
//! and give up after too many consecutive failed batches.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::constants::monitor::SLEEP_SLICE_MS;
use crate::errors::PipelineError;
use crate::orchestrator::BatchOrchestrator;
use crate::transport::fs::VideoScanner;

/// What a monitor session did before it stopped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    /// Polls performed, including empty ones.
    pub polls: u64,
    /// Polls that ran a batch.
    pub batches: u64,
    /// Artifacts processed successfully across all batches.
    pub artifacts_processed: u64,
    /// Stopped because of a shutdown request.
    pub interrupted: bool,
}

/// Drives repeated batches on one orchestrator.
pub struct Monitor<'a> {
    orchestrator: &'a BatchOrchestrator,
    config: MonitorConfig,
}

impl<'a> Monitor<'a> {
    /// Monitor polling with `config`.
    pub fn new(orchestrator: &'a BatchOrchestrator, config: MonitorConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Poll until shutdown, `max_polls`, or retry exhaustion.
    ///
    /// A missing input directory means "waiting" and an empty one counts as a
    /// successful poll; both reset nothing but the retry counter on success.
    pub fn run(&self) -> Result<MonitorSummary, PipelineError> {
        let shutdown = self.orchestrator.shutdown_flag();
        let input_dir = self.orchestrator.config().input_dir.clone();
        let mut summary = MonitorSummary::default();
        let mut consecutive_failures: u32 = 0;
        info!(
            input = %input_dir.display(),
            interval_secs = self.config.interval.as_secs(),
            "[videos:monitor] started"
        );

        loop {
            if shutdown.load(Ordering::SeqCst) {
                summary.interrupted = true;
                break;
            }
            if self.config.max_polls.is_some_and(|max| summary.polls >= max) {
                break;
            }
            summary.polls += 1;

            if !input_dir.is_dir() {
                info!(input = %input_dir.display(), "[videos:monitor] waiting for input directory");
            } else {
                match self.poll_once() {
                    Ok(Some(processed)) => {
                        consecutive_failures = 0;
                        summary.batches += 1;
                        summary.artifacts_processed += processed;
                    }
                    Ok(None) => consecutive_failures = 0,
                    Err(err) => {
                        consecutive_failures += 1;
                        warn!(
                            attempt = consecutive_failures,
                            max_retries = self.config.max_retries,
                            error = %err,
                            "[videos:monitor] batch failed"
                        );
                        if consecutive_failures >= self.config.max_retries {
                            error!("[videos:monitor] retry budget exhausted; stopping");
                            return Err(PipelineError::MonitorExhausted {
                                attempts: consecutive_failures,
                                last_error: err.to_string(),
                            });
                        }
                    }
                }
            }

            if shutdown.load(Ordering::SeqCst) {
                summary.interrupted = true;
                break;
            }
            if self.config.max_polls.is_some_and(|max| summary.polls >= max) {
                break;
            }
            self.sleep_interruptibly();
        }
        info!(
            polls = summary.polls,
            batches = summary.batches,
            "[videos:monitor] stopped"
        );
        Ok(summary)
    }

    /// `Ok(None)` when there was nothing to process.
    fn poll_once(&self) -> Result<Option<u64>, PipelineError> {
        let config = self.orchestrator.config();
        let pending = VideoScanner::new(&config.input_dir)
            .excluding(config.archive_dir())
            .excluding(config.compressed_dir())
            .scan()?;
        if pending.is_empty() {
            return Ok(None);
        }
        info!(files = pending.len(), "[videos:monitor] new recordings found");
        let report = self.orchestrator.run_batch()?;
        if self.config.print_summaries {
            print!("{}", report.render_summary());
        }
        Ok(Some(report.successful))
    }

    fn sleep_interruptibly(&self) {
        let shutdown = self.orchestrator.shutdown_flag();
        let deadline = Instant::now() + self.config.interval;
        let slice = Duration::from_millis(SLEEP_SLICE_MS);
        while !shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(slice.min(deadline - now));
        }
    }
}
