use std::fs;
use std::sync::Arc;

use tempfile::tempdir;
use test_video_archiver::stores::catalog::CatalogStats;
use test_video_archiver::stores::compression_stats::CompressionTotals;
use test_video_archiver::stores::memory::MemoryStats;
use test_video_archiver::{
    BatchOrchestrator, CompressionConfig, CompressionQuality, Encoder, PipelineConfig,
    PipelineError, QualityProfile, QualityTier, TestResult,
};

#[path = "common/fixtures.rs"]
mod fixtures;

use fixtures::{FAIL_MARKER, ScriptedEncoder, sparse_video, video_with_bytes};

/// Lets a test keep a handle on the encoder the orchestrator owns.
struct Shared(Arc<ScriptedEncoder>);

impl Encoder for Shared {
    fn encode(
        &self,
        source: &std::path::Path,
        target: &std::path::Path,
        profile: &QualityProfile,
    ) -> Result<(), PipelineError> {
        self.0.encode(source, target, profile)
    }
}

fn small_threshold_config(input: &std::path::Path, root: &std::path::Path) -> PipelineConfig {
    PipelineConfig::new(input, root)
        .with_compression(CompressionConfig::default().with_skip_threshold(10))
}

#[test]
fn one_failing_item_does_not_stop_the_batch() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("input");
    for idx in 1..=5 {
        let body: Vec<u8> = if idx == 3 {
            [FAIL_MARKER, &[0u8; 60]].concat()
        } else {
            vec![7u8; 64]
        };
        video_with_bytes(&input, &format!("match-pass-{idx}.webm"), &body);
    }
    let root = temp.path().join("root");
    let orchestrator = BatchOrchestrator::with_encoder(
        small_threshold_config(&input, &root),
        Box::new(ScriptedEncoder::default()),
    );

    let report = orchestrator.run_batch().unwrap();
    assert_eq!(report.total, 5);
    assert_eq!(report.successful, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].file.ends_with("match-pass-3.webm"));

    let catalog = orchestrator.stores().catalog.load().unwrap();
    assert_eq!(catalog.tests.len(), 4);
    assert!(!catalog.tests.contains_key("match-pass-3"));

    // The failed item leaves nothing behind in the archive.
    let archived: Vec<_> = walk_files(&root.join("archive"));
    assert_eq!(archived.len(), 4);
}

#[test]
fn corrupt_store_leaves_archive_and_stats_untouched_across_retries() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("input");
    video_with_bytes(&input, "match-pass.webm", &[7u8; 64]);
    let root = temp.path().join("root");
    fs::create_dir_all(root.join("local-memory")).unwrap();
    fs::write(root.join("local-memory/video-memories.json"), "{ not json").unwrap();
    let orchestrator = BatchOrchestrator::with_encoder(
        small_threshold_config(&input, &root),
        Box::new(ScriptedEncoder::default()),
    );

    for _ in 0..3 {
        let err = orchestrator.run_batch().unwrap_err();
        assert!(!err.is_item_scoped());
        assert!(err.to_string().contains("memory"), "{err}");
    }

    assert!(walk_files(&root.join("archive")).is_empty());
    assert!(walk_files(&root.join("compressed")).is_empty());
    let compression = orchestrator.compression().stats().load().unwrap();
    assert!(compression.compressions.is_empty());
    assert!(orchestrator.stores().catalog.load().unwrap().tests.is_empty());
    assert!(input.join("match-pass.webm").exists());
}

#[test]
fn reprocessing_the_same_video_keeps_one_catalog_entry() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("input");
    video_with_bytes(&input, "content-ai-fail.webm", &[3u8; 64]);
    let root = temp.path().join("root");
    let orchestrator = BatchOrchestrator::with_encoder(
        small_threshold_config(&input, &root).with_reports(false),
        Box::new(ScriptedEncoder::default()),
    );

    orchestrator.run_batch().unwrap();
    orchestrator.run_batch().unwrap();

    let catalog = orchestrator.stores().catalog.load().unwrap();
    assert_eq!(catalog.tests.len(), 1);
    assert_eq!(catalog.stats.total_tests, 1);
    let entry = &catalog.tests["content-ai-fail"];
    assert_eq!(entry.module, "content");
    assert_eq!(entry.feature, "ai-content-generation");
    assert_eq!(entry.result, TestResult::Failure);

    // The append-only memory log keeps both runs.
    let memory = orchestrator.stores().memory.load().unwrap();
    assert_eq!(memory.total_memories, 2);
    assert_eq!(memory.memories[1].related_memories, Vec::<String>::new());
}

#[test]
fn stored_aggregates_match_a_recomputation_from_raw_entries() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("input");
    video_with_bytes(&input, "match-pass.webm", &[1u8; 64]);
    video_with_bytes(&input, "file-space-fail.webm", &[2u8; 48]);
    video_with_bytes(&input, "mystery.webm", &[3u8; 4]);
    video_with_bytes(&input, "nested/game-error.webm", &[4u8; 80]);
    let root = temp.path().join("root");
    let orchestrator = BatchOrchestrator::with_encoder(
        small_threshold_config(&input, &root),
        Box::new(ScriptedEncoder::default()),
    );
    let report = orchestrator.run_batch().unwrap();
    assert_eq!(report.successful, 4);
    assert_eq!(report.unmapped_count, 1);

    let stores = orchestrator.stores();
    let catalog = stores.catalog.load().unwrap();
    assert_eq!(catalog.stats, CatalogStats::from_entries(catalog.tests.values()));
    assert_eq!(catalog.stats.unmapped_tests, 1);

    let memory = stores.memory.load().unwrap();
    assert_eq!(memory.memory_stats, MemoryStats::from_entries(&memory.memories));

    let compression = orchestrator.compression().stats().load().unwrap();
    assert_eq!(compression.compressions.len(), 4);
    assert_eq!(compression.total_stats, CompressionTotals::from_entries(&compression.compressions));
    assert_eq!(compression.quality_stats[&CompressionQuality::Skipped], 1);
}

#[test]
fn structured_failure_recording_is_archived_at_high_quality() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("input");
    sparse_video(&input, "20240101_games_MatchGame_fail_v1.0.0_001.webm", 2_000_000);
    let root = temp.path().join("root");
    let encoder = Arc::new(ScriptedEncoder::default());
    let orchestrator = BatchOrchestrator::with_encoder(
        PipelineConfig::new(&input, &root).with_reports(false),
        Box::new(Shared(Arc::clone(&encoder))),
    );

    let report = orchestrator.run_batch().unwrap();
    assert_eq!(report.successful, 1);
    assert_eq!(encoder.tiers(), vec![QualityTier::High]);

    let catalog = orchestrator.stores().catalog.load().unwrap();
    let entry = &catalog.tests["20240101_games_MatchGame_fail_v1.0.0_001"];
    assert!(!entry.unmapped);
    assert_eq!(entry.compression_quality, CompressionQuality::High);
    let expected_dir = root.join("archive/failure/games/MatchGame");
    assert_eq!(entry.archive_path.parent().unwrap(), expected_dir);
    let file_name = entry.archive_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("MatchGame-test__chromium__20240101-"), "{file_name}");
}

#[test]
fn large_successful_recording_drops_to_archive_quality() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("input");
    sparse_video(&input, "20240101_games_MatchGame_pass_v1.0.0_002.webm", 60_000_000);
    let encoder = Arc::new(ScriptedEncoder::default());
    let orchestrator = BatchOrchestrator::with_encoder(
        PipelineConfig::new(&input, temp.path().join("root")).with_reports(false),
        Box::new(Shared(Arc::clone(&encoder))),
    );

    orchestrator.run_batch().unwrap();
    assert_eq!(encoder.tiers(), vec![QualityTier::Archive]);
    let catalog = orchestrator.stores().catalog.load().unwrap();
    let entry = &catalog.tests["20240101_games_MatchGame_pass_v1.0.0_002"];
    assert_eq!(entry.result, TestResult::Success);
    assert_eq!(entry.compressed_size, 30_000_000);
}

#[test]
fn daily_report_lands_under_reports_dir() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("input");
    video_with_bytes(&input, "match-pass.webm", &[1u8; 64]);
    let root = temp.path().join("root");
    let orchestrator = BatchOrchestrator::with_encoder(
        small_threshold_config(&input, &root),
        Box::new(ScriptedEncoder::default()),
    );
    orchestrator.run_batch().unwrap();

    let reports: Vec<_> = walk_files(&root.join("reports/daily"));
    assert_eq!(reports.len(), 1);
    let raw = fs::read_to_string(&reports[0]).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["successful"], 1);
}

fn walk_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}
