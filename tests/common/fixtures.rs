#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use test_video_archiver::config::QualityProfile;
use test_video_archiver::{Encoder, PipelineError, QualityTier};

/// Marker that makes [`ScriptedEncoder`] fail on a source.
pub const FAIL_MARKER: &[u8] = b"FAIL";

/// Fake encoder: writes half the source size, or fails when the source
/// starts with [`FAIL_MARKER`]. Records every tier it was asked for.
#[derive(Default)]
pub struct ScriptedEncoder {
    pub calls: Mutex<Vec<(PathBuf, QualityTier)>>,
}

impl ScriptedEncoder {
    pub fn tiers(&self) -> Vec<QualityTier> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, tier)| *tier)
            .collect()
    }
}

impl Encoder for ScriptedEncoder {
    fn encode(&self, source: &Path, target: &Path, profile: &QualityProfile) -> Result<(), PipelineError> {
        self.calls
            .lock()
            .unwrap()
            .push((source.to_path_buf(), profile.tier));
        let mut head = [0u8; 4];
        let read = {
            use std::io::Read;
            File::open(source)?.read(&mut head)?
        };
        if &head[..read] == FAIL_MARKER {
            return Err(PipelineError::Encoder {
                path: source.to_path_buf(),
                reason: "exit status: 1".to_string(),
            });
        }
        let len = fs::metadata(source)?.len();
        File::create(target)?.set_len(len / 2)?;
        Ok(())
    }
}

/// Fake encoder whose output is always larger than its input.
pub struct InflatingEncoder;

impl Encoder for InflatingEncoder {
    fn encode(&self, source: &Path, target: &Path, _profile: &QualityProfile) -> Result<(), PipelineError> {
        let len = fs::metadata(source)?.len();
        File::create(target)?.set_len(len + 1_024)?;
        Ok(())
    }
}

/// Sparse file of `len` bytes; cheap even for tens of megabytes.
pub fn sparse_video(dir: &Path, name: &str, len: u64) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    File::create(&path).unwrap().set_len(len).unwrap();
    path
}

pub fn video_with_bytes(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}
