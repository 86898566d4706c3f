use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;
use test_video_archiver::stores::CompressionStatsStore;
use test_video_archiver::{
    ArchiveOrganizer, ArtifactMetadata, CompressionConfig, CompressionEngine, CompressionQuality,
    MetadataDeriver, Overrides, PipelineError, QualityTier,
};

#[path = "common/fixtures.rs"]
mod fixtures;

use fixtures::{InflatingEncoder, ScriptedEncoder, sparse_video, video_with_bytes};

fn derived(input: &Path, source: &Path) -> ArtifactMetadata {
    let recorded_at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
    let size = fs::metadata(source).unwrap().len();
    MetadataDeriver::new(input, Overrides::default()).derive_with(source, None, size, Some(recorded_at))
}

fn engine(root: &Path, encoder: impl test_video_archiver::Encoder + 'static) -> CompressionEngine {
    CompressionEngine::new(
        CompressionConfig::default(),
        Box::new(encoder),
        CompressionStatsStore::new(root.join("compression-stats.json")),
    )
}

#[test]
fn repeated_placements_never_overwrite_each_other() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("input");
    let source = video_with_bytes(&input, "match-pass.webm", b"recording");
    let trace = video_with_bytes(&input, "trace.zip", b"trace");
    let mut meta = derived(&input, &source);
    meta.trace_path = Some(trace);
    let organizer = ArchiveOrganizer::new(temp.path().join("archive"), temp.path().join("compressed"));

    let placements: Vec<_> = (0..20).map(|_| organizer.place(&meta).unwrap()).collect();
    let videos: HashSet<_> = placements.iter().map(|p| p.archive_path.clone()).collect();
    assert_eq!(videos.len(), 20);
    for placement in &placements {
        let video = &placement.archive_path;
        let trace = placement.trace_archive_path.as_ref().unwrap();
        assert_eq!(video.file_stem(), trace.file_stem());
        assert_eq!(fs::read(video).unwrap(), b"recording");
    }
    let last = placements[19].archive_path.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(last, "match-game-test__chromium__20240305-140709_20.webm");
}

#[test]
fn exhausted_suffixes_fail_only_that_item() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("input");
    let source = video_with_bytes(&input, "match-pass.webm", b"recording");
    let meta = derived(&input, &source);
    let organizer = ArchiveOrganizer::new(temp.path().join("archive"), temp.path().join("compressed"));

    for _ in 0..99 {
        organizer.place(&meta).unwrap();
    }
    let err = organizer.place(&meta).unwrap_err();
    assert!(matches!(err, PipelineError::CollisionExhausted { .. }));
    assert!(err.is_item_scoped());
}

#[test]
fn compression_never_grows_the_artifact() {
    let temp = tempdir().unwrap();
    let source = sparse_video(&temp.path().join("in"), "big.webm", 3_000_000);
    let target = temp.path().join("out/big.webm");
    let engine = engine(temp.path(), InflatingEncoder);

    let outcome = engine.compress(&source, &target, QualityTier::Standard).unwrap();
    assert_eq!(outcome.quality, CompressionQuality::Original);
    assert_eq!(outcome.compressed_size, 3_000_000);
    assert_eq!(fs::metadata(&target).unwrap().len(), 3_000_000);
    assert_eq!(outcome.ratio_pct, 0.0);
    // No scratch files are left beside the target.
    assert_eq!(fs::read_dir(temp.path().join("out")).unwrap().count(), 1);
}

#[test]
fn skip_threshold_is_one_decimal_megabyte() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("in");
    let just_over = sparse_video(&input, "over.webm", 1_048_575);
    let just_under = sparse_video(&input, "under.webm", 999_999);
    let engine = engine(temp.path(), ScriptedEncoder::default());

    let over_target = temp.path().join("out/over.webm");
    let encoded = engine.compress(&just_over, &over_target, QualityTier::High).unwrap();
    assert_eq!(encoded.quality, CompressionQuality::High);
    assert!(encoded.compressed_size < encoded.original_size);

    let under_target = temp.path().join("out/under.webm");
    let skipped = engine.compress(&just_under, &under_target, QualityTier::High).unwrap();
    assert_eq!(skipped.quality, CompressionQuality::Skipped);
    assert_eq!(skipped.compressed_size, 999_999);

    engine.record_outcome(&just_over, &over_target, &encoded).unwrap();
    engine.record_outcome(&just_under, &under_target, &skipped).unwrap();

    let stats = engine.stats().load().unwrap();
    assert_eq!(stats.compressions.len(), 2);
    assert_eq!(stats.total_stats.total_compressions, 2);
}

#[test]
fn encoder_failure_leaves_no_target() {
    let temp = tempdir().unwrap();
    let mut body = fixtures::FAIL_MARKER.to_vec();
    body.resize(1_200_000, 0);
    let source = video_with_bytes(&temp.path().join("in"), "broken.webm", &body);
    let target = temp.path().join("out/broken.webm");
    let engine = engine(temp.path(), ScriptedEncoder::default());

    let err = engine.compress(&source, &target, QualityTier::Standard).unwrap_err();
    assert!(matches!(err, PipelineError::Encoder { .. }));
    assert!(!target.exists());
    assert!(engine.stats().load().unwrap().compressions.is_empty());
}
