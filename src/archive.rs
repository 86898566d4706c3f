//! Canonical archive layout:
//! `archive/{result}/{module}/{feature}/{testName}__{browser}__{YYYYMMDD-HHMMSS}[_NN].webm`.
//!
//! Sources are copied, never moved, and an occupied name is never overwritten.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::artifacts::{
    ARCHIVE_TIMESTAMP_FORMAT, FIRST_COLLISION_SUFFIX, MAX_BROWSER_NAME_BYTES,
    MAX_COLLISION_SUFFIX, MAX_FILE_NAME_BYTES, NAME_PART_SEPARATOR, TRACE_EXTENSION,
    VIDEO_EXTENSION,
};
use crate::data::{ArchivePlacement, ArtifactMetadata};
use crate::errors::PipelineError;
use crate::utils::{sanitize_name, truncate_name};

/// Bytes a stem must leave free for `_NN` plus the longest `.{extension}`.
fn reserved_suffix_bytes() -> usize {
    let suffix = format!("_{MAX_COLLISION_SUFFIX:02}").len();
    suffix + 1 + VIDEO_EXTENSION.len().max(TRACE_EXTENSION.len())
}

/// Sanitized directory component, bounded to one file name.
fn dir_component(raw: &str) -> String {
    truncate_name(&sanitize_name(raw), MAX_FILE_NAME_BYTES)
}

/// Places recordings into the archive tree and names their compressed copies.
#[derive(Clone, Debug)]
pub struct ArchiveOrganizer {
    archive_dir: PathBuf,
    compressed_dir: PathBuf,
}

impl ArchiveOrganizer {
    /// Organizer rooted at the archive and compressed-copy directories.
    pub fn new(archive_dir: impl Into<PathBuf>, compressed_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            compressed_dir: compressed_dir.into(),
        }
    }

    /// `{result}/{module}/{feature}` below `root`.
    fn classified_dir(root: &Path, meta: &ArtifactMetadata) -> PathBuf {
        root.join(meta.result.as_str())
            .join(dir_component(&meta.module))
            .join(dir_component(&meta.feature))
    }

    /// Archive directory for `meta`.
    pub fn destination_dir(&self, meta: &ArtifactMetadata) -> PathBuf {
        Self::classified_dir(&self.archive_dir, meta)
    }

    /// Base file name before any collision suffix.
    ///
    /// The title is cut so that the base, a collision suffix, and either
    /// extension always fit in one file name.
    pub fn base_name(meta: &ArtifactMetadata) -> String {
        let browser = truncate_name(&sanitize_name(&meta.browser), MAX_BROWSER_NAME_BYTES);
        let stamp = meta.test_date.format(ARCHIVE_TIMESTAMP_FORMAT).to_string();
        let fixed = browser.len() + stamp.len() + 2 * NAME_PART_SEPARATOR.len();
        let title_budget = MAX_FILE_NAME_BYTES - reserved_suffix_bytes() - fixed;
        let title = truncate_name(&sanitize_name(&meta.title), title_budget);
        [title, browser, stamp].join(NAME_PART_SEPARATOR)
    }

    /// Copy the recording (and its trace, when present) into the archive.
    pub fn place(&self, meta: &ArtifactMetadata) -> Result<ArchivePlacement, PipelineError> {
        let dir = self.destination_dir(meta);
        fs::create_dir_all(&dir)?;
        let base = Self::base_name(meta);
        let trace_source = meta.trace_path.as_deref().filter(|path| {
            let exists = path.is_file();
            if !exists {
                warn!(
                    trace = %path.display(),
                    "[videos:archive] trace referenced by manifest is missing"
                );
            }
            exists
        });

        let stem = reserve_free_stem(&dir, &base, trace_source.is_some())?;
        let archive_path = dir.join(format!("{stem}.{VIDEO_EXTENSION}"));
        if let Err(err) = fs::copy(&meta.source_path, &archive_path) {
            let _ = fs::remove_file(&archive_path);
            return Err(err.into());
        }

        let trace_archive_path = match trace_source {
            Some(trace) => {
                let target = dir.join(format!("{stem}.{TRACE_EXTENSION}"));
                if let Err(err) = fs::copy(trace, &target) {
                    let _ = fs::remove_file(&target);
                    let _ = fs::remove_file(&archive_path);
                    return Err(err.into());
                }
                Some(target)
            }
            None => None,
        };
        debug!(
            archive = %archive_path.display(),
            "[videos:archive] placed"
        );
        Ok(ArchivePlacement {
            archive_path,
            trace_archive_path,
        })
    }

    /// Where the compressed copy of an archived recording goes.
    pub fn compressed_target(&self, meta: &ArtifactMetadata, placement: &ArchivePlacement) -> PathBuf {
        let dir = Self::classified_dir(&self.compressed_dir, meta);
        match placement.archive_path.file_name() {
            Some(name) => dir.join(name),
            None => dir.join(format!("{}.{VIDEO_EXTENSION}", Self::base_name(meta))),
        }
    }
}

/// Claim the first free stem (`base`, `base_02`, ... `base_99`) by creating its video file.
fn reserve_free_stem(dir: &Path, base: &str, with_trace: bool) -> Result<String, PipelineError> {
    let candidates = std::iter::once(base.to_string()).chain(
        (FIRST_COLLISION_SUFFIX..=MAX_COLLISION_SUFFIX).map(|n| format!("{base}_{n:02}")),
    );
    for stem in candidates {
        if with_trace && dir.join(format!("{stem}.{TRACE_EXTENSION}")).exists() {
            continue;
        }
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(format!("{stem}.{VIDEO_EXTENSION}")))
        {
            Ok(_) => return Ok(stem),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(PipelineError::CollisionExhausted {
        dir: dir.to_path_buf(),
        base: base.to_string(),
    })
}
