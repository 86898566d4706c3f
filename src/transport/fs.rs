use chrono::{DateTime, Utc};
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::constants::artifacts::VIDEO_EXTENSION;
use crate::errors::PipelineError;

/// Recursive scanner collecting recordings under a root.
pub struct VideoScanner {
    root: PathBuf,
    exclude: Vec<PathBuf>,
}

impl VideoScanner {
    /// Create a scanner rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude: Vec::new(),
        }
    }

    /// Skip everything under `dir` (used when the archive root sits inside the input tree).
    pub fn excluding(mut self, dir: impl AsRef<Path>) -> Self {
        self.exclude.push(normalize_path(dir.as_ref()));
        self
    }

    /// Collect every `*.webm` file, sorted by path so batch order is reproducible.
    pub fn scan(&self) -> Result<Vec<PathBuf>, PipelineError> {
        if !self.root.is_dir() {
            return Err(PipelineError::Configuration(format!(
                "input directory does not exist: {}",
                self.root.display()
            )));
        }
        let mut candidates: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(entry.path()))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_video_file(path))
            .collect();
        candidates.sort();
        Ok(candidates)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude.is_empty() {
            return false;
        }
        let normalized = normalize_path(path);
        self.exclude
            .iter()
            .any(|excluded| normalized.starts_with(excluded))
    }
}

/// True if the path has a `.webm` extension (case-insensitive).
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(VIDEO_EXTENSION))
        .unwrap_or(false)
}

/// Absolute, lexically normalized form of `path` (`.` and `..` resolved, no symlink lookups).
///
/// Manifest attachment paths and discovered files are compared in this form.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Best-effort file modified time.
pub fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Size of the file at `path` in bytes.
pub fn file_size(path: &Path) -> Result<u64, PipelineError> {
    Ok(fs::metadata(path)?.len())
}

/// Create `path`'s parent directory when it has one.
pub fn ensure_parent_dir(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
