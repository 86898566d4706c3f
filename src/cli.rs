use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, ValueEnum, error::ErrorKind};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{CompressionConfig, MonitorConfig, Overrides, PipelineConfig};
use crate::constants::compression::{DEFAULT_ENCODER_PROGRAM, DEFAULT_ENCODER_TIMEOUT_SECS};
use crate::constants::monitor::{DEFAULT_INTERVAL_SECS, DEFAULT_MAX_RETRIES};
use crate::monitor::Monitor;
use crate::orchestrator::BatchOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Process the input tree once.
    #[value(alias = "archive")]
    Batch,
    /// Poll the input tree until stopped.
    Monitor,
}

#[derive(Debug, Parser)]
#[command(
    name = "process_test_videos",
    disable_help_subcommand = true,
    disable_version_flag = true,
    about = "Classify, compress, and archive browser-test recordings",
    long_about = "Walk an input tree of .webm recordings, correlate them with the test-run manifest, re-encode where worthwhile, copy them into the canonical archive layout, and update the JSON stores.",
    after_help = "Module, feature, and version overrides may also be supplied through the MODULE, FEATURE, and VERSION environment variables."
)]
struct ProcessTestVideosCli {
    #[arg(
        short = 'i',
        long = "input",
        value_name = "DIR",
        default_value = "test-results",
        help = "Directory scanned recursively for .webm recordings"
    )]
    input: PathBuf,
    #[arg(
        short = 't',
        long = "test-results",
        value_name = "DIR",
        help = "Directory holding the run manifest (defaults to the input directory)"
    )]
    test_results: Option<PathBuf>,
    #[arg(
        long = "archive-root",
        value_name = "DIR",
        default_value = "test-videos",
        help = "Root of the archive tree and JSON stores"
    )]
    archive_root: PathBuf,
    #[arg(long, env = "MODULE", help = "Module override applied to every artifact")]
    module: Option<String>,
    #[arg(long, env = "FEATURE", help = "Feature override applied to every artifact")]
    feature: Option<String>,
    #[arg(long, env = "VERSION", help = "Version label override applied to every artifact")]
    version: Option<String>,
    #[arg(long, value_enum, default_value_t = ModeArg::Batch, help = "Run once or keep polling")]
    mode: ModeArg,
    #[arg(
        short = 'm',
        long = "monitor",
        help = "Shorthand for --mode monitor"
    )]
    monitor: bool,
    #[arg(long = "no-reports", help = "Skip writing the daily batch report")]
    no_reports: bool,
    #[arg(
        short = 'c',
        long = "cleanup",
        help = "Delete source recordings after they are archived (always on in monitor mode)"
    )]
    cleanup: bool,
    #[arg(short = 'q', long = "quiet", help = "Only log warnings and errors")]
    quiet: bool,
    #[arg(
        long = "interval-secs",
        default_value_t = DEFAULT_INTERVAL_SECS,
        value_parser = parse_positive_u64,
        help = "Seconds between polls in monitor mode"
    )]
    interval_secs: u64,
    #[arg(
        long = "max-retries",
        default_value_t = DEFAULT_MAX_RETRIES,
        value_parser = parse_positive_u32,
        help = "Consecutive failed batches tolerated in monitor mode"
    )]
    max_retries: u32,
    #[arg(long = "max-polls", help = "Stop monitor mode after this many polls")]
    max_polls: Option<u64>,
    #[arg(
        long = "encoder",
        value_name = "PROGRAM",
        default_value = DEFAULT_ENCODER_PROGRAM,
        help = "ffmpeg-compatible encoder executable"
    )]
    encoder: PathBuf,
    #[arg(
        long = "encoder-timeout-secs",
        default_value_t = DEFAULT_ENCODER_TIMEOUT_SECS,
        value_parser = parse_positive_u64,
        help = "Kill the encoder after this many seconds"
    )]
    encoder_timeout_secs: u64,
}

impl ProcessTestVideosCli {
    fn is_monitor(&self) -> bool {
        self.monitor || self.mode == ModeArg::Monitor
    }

    fn pipeline_config(&self) -> PipelineConfig {
        let overrides = Overrides {
            module: non_blank(self.module.as_deref()),
            feature: non_blank(self.feature.as_deref()),
            version: non_blank(self.version.as_deref()),
        };
        let compression = CompressionConfig::default()
            .with_encoder_program(&self.encoder)
            .with_encoder_timeout(Duration::from_secs(self.encoder_timeout_secs));
        let mut config = PipelineConfig::new(&self.input, &self.archive_root)
            .with_overrides(overrides)
            .with_reports(!self.no_reports)
            // Monitor mode would reprocess the same recordings every poll otherwise.
            .with_cleanup(self.cleanup || self.is_monitor())
            .with_compression(compression);
        if let Some(dir) = &self.test_results {
            config = config.with_test_results_dir(dir);
        }
        config
    }

    fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(self.interval_secs),
            max_retries: self.max_retries,
            max_polls: self.max_polls,
            print_summaries: !self.quiet,
        }
    }
}

/// Entry point of the `process_test_videos` binary.
///
/// Returns the process exit code: `0` when the batch (or monitor session)
/// completed, `1` on a run-level failure. Per-item failures only show up in
/// the report.
pub fn run_process_test_videos<I>(args_iter: I) -> Result<u8, Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let Some(cli) = parse_cli::<ProcessTestVideosCli, _>(
        std::iter::once("process_test_videos".to_string()).chain(args_iter),
    )?
    else {
        return Ok(0);
    };

    init_tracing(cli.quiet);

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    if let Err(err) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %err, "[videos:cli] failed to install Ctrl+C handler");
    }

    let orchestrator = BatchOrchestrator::new(cli.pipeline_config()).with_shutdown_flag(shutdown);

    if cli.is_monitor() {
        return match Monitor::new(&orchestrator, cli.monitor_config()).run() {
            Ok(_) => Ok(0),
            Err(err) => {
                error!(error = %err, "[videos:cli] monitor stopped");
                Ok(1)
            }
        };
    }

    match orchestrator.run_batch() {
        Ok(report) => {
            if !cli.quiet {
                print!("{}", report.render_summary());
            }
            Ok(0)
        }
        Err(err) => {
            error!(error = %err, "[videos:cli] batch failed");
            Ok(1)
        }
    }
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_positive_u64(raw: &str) -> Result<u64, String> {
    let parsed = raw
        .parse::<u64>()
        .map_err(|_| format!("could not parse '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(raw: &str) -> Result<u32, String> {
    let parsed = parse_positive_u64(raw)?;
    u32::try_from(parsed).map_err(|_| format!("'{raw}' is too large"))
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
