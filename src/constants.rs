/// Constants used by artifact discovery and naming.
pub mod artifacts {
    /// Extension of recordings picked up from the input tree.
    pub const VIDEO_EXTENSION: &str = "webm";
    /// Extension of companion trace archives.
    pub const TRACE_EXTENSION: &str = "zip";
    /// Separator between the name parts of an archived file.
    pub const NAME_PART_SEPARATOR: &str = "__";
    /// Separator used when a relative path is folded into a video id.
    pub const VIDEO_ID_PATH_SEPARATOR: &str = "__";
    /// Timestamp layout used in archived file names.
    pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
    /// First collision suffix appended to an occupied archive name (`_02`).
    pub const FIRST_COLLISION_SUFFIX: u32 = 2;
    /// Last collision suffix tried before giving up (`_99`).
    pub const MAX_COLLISION_SUFFIX: u32 = 99;
    /// Fallback name when sanitization leaves nothing.
    pub const UNTITLED_NAME: &str = "untitled";
    /// Longest file name (in bytes) most filesystems accept.
    pub const MAX_FILE_NAME_BYTES: usize = 255;
    /// Longest browser name kept in an archived file name.
    pub const MAX_BROWSER_NAME_BYTES: usize = 32;
}

/// Constants used by classification of recordings.
pub mod classify {
    /// Module assigned when nothing else determined it.
    pub const DEFAULT_MODULE: &str = "games";
    /// Feature assigned when nothing else determined it.
    pub const DEFAULT_FEATURE: &str = "unknown";
    /// Browser assigned when the manifest does not name one.
    pub const DEFAULT_BROWSER: &str = "chromium";
    /// Version assigned when the filename does not carry one.
    pub const DEFAULT_VERSION: &str = "v1.0.0";
    /// Sequence assigned when the filename does not carry one.
    pub const DEFAULT_SEQUENCE: &str = "001";
    /// Minimum underscore-delimited segments for a structured filename.
    pub const STRUCTURED_MIN_SEGMENTS: usize = 4;
    /// Date layout of the first structured filename segment.
    pub const FILENAME_DATE_FORMAT: &str = "%Y%m%d";
    /// Suffix appended to the feature to form a test name when no title is known.
    pub const TEST_NAME_SUFFIX: &str = "-test";
}

/// Constants used by the compression decision engine.
pub mod compression {
    /// Bytes in one (decimal) megabyte.
    pub const BYTES_PER_MB: u64 = 1_000_000;
    /// Files strictly below this size are copied verbatim.
    pub const SKIP_THRESHOLD_BYTES: u64 = BYTES_PER_MB;
    /// Files strictly below this size are encoded at `high` in smart mode.
    pub const SMALL_FILE_BYTES: u64 = 5 * BYTES_PER_MB;
    /// Files strictly above this size are encoded at `archive` in smart mode.
    pub const LARGE_FILE_BYTES: u64 = 50 * BYTES_PER_MB;
    /// Default external encoder program.
    pub const DEFAULT_ENCODER_PROGRAM: &str = "ffmpeg";
    /// Default encoder wall-clock limit in seconds.
    pub const DEFAULT_ENCODER_TIMEOUT_SECS: u64 = 600;
    /// Interval between encoder liveness checks in milliseconds.
    pub const ENCODER_POLL_INTERVAL_MS: u64 = 100;
    /// Video codec passed to the encoder for every tier.
    pub const VIDEO_CODEC: &str = "libvpx-vp9";
}

/// Constants used by the JSON stores and archive-root layout.
pub mod stores {
    /// Directory holding archived recordings.
    pub const ARCHIVE_DIR: &str = "archive";
    /// Directory holding re-encoded recordings.
    pub const COMPRESSED_DIR: &str = "compressed";
    /// Directory holding catalog and compression stats.
    pub const METADATA_DIR: &str = "metadata";
    /// Directory holding memory, pattern, and failure-analysis logs.
    pub const MEMORY_DIR: &str = "local-memory";
    /// Directory holding daily batch reports.
    pub const REPORTS_DIR: &str = "reports/daily";
    /// Directory holding the run lock.
    pub const LOCKS_DIR: &str = "locks";
    /// Run lock filename.
    pub const LOCK_FILENAME: &str = "pipeline.lock";
    /// Catalog store filename.
    pub const CATALOG_FILENAME: &str = "test-catalog.json";
    /// Compression stats store filename.
    pub const COMPRESSION_STATS_FILENAME: &str = "compression-stats.json";
    /// Memory log filename.
    pub const MEMORY_FILENAME: &str = "video-memories.json";
    /// Pattern index filename.
    pub const PATTERNS_FILENAME: &str = "test-patterns.json";
    /// Failure analysis log filename.
    pub const FAILURE_ANALYSIS_FILENAME: &str = "failure-analysis.json";
    /// Maximum related memory ids attached to a new memory entry.
    pub const MAX_RELATED_MEMORIES: usize = 5;
}

/// Constants used by manifest correlation.
pub mod manifest {
    /// Manifest filename looked up in the test-results directory.
    pub const MANIFEST_FILENAME: &str = "results.json";
    /// Attachment name Playwright uses for recordings.
    pub const VIDEO_ATTACHMENT_NAME: &str = "video";
    /// Attachment name Playwright uses for trace archives.
    pub const TRACE_ATTACHMENT_NAME: &str = "trace";
    /// Result status mapped to a successful outcome.
    pub const PASSED_STATUS: &str = "passed";
}

/// Constants used by batch reporting and recommendations.
pub mod report {
    /// Processing success rate (percent) below which a quality recommendation is raised.
    pub const MIN_PROCESSING_SUCCESS_RATE: f64 = 90.0;
    /// Per-module test success rate (percent) below which a module recommendation is raised.
    pub const MIN_MODULE_SUCCESS_RATE: f64 = 80.0;
    /// Average seconds per item above which a performance recommendation is raised.
    pub const SLOW_ITEM_SECONDS: f64 = 30.0;
    /// Report filename prefix; the date (`YYYY-MM-DD`) and `.json` are appended.
    pub const REPORT_FILENAME_PREFIX: &str = "batch-processing-";
}

/// Constants used by monitor mode.
pub mod monitor {
    /// Default poll interval in seconds.
    pub const DEFAULT_INTERVAL_SECS: u64 = 30;
    /// Default consecutive failed batches tolerated before exiting.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// Granularity of interruptible sleeps in milliseconds.
    pub const SLEEP_SLICE_MS: u64 = 200;
}
