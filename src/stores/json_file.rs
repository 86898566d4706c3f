//! Whole-document JSON persistence.
//!
//! Every mutation reads the full document, applies one change, recomputes the
//! aggregate from the entire collection, and writes the document back through a
//! temp file in the same directory followed by a rename.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::PipelineError;

/// A JSON document holding a collection plus an aggregate derived from it.
pub trait StoreDocument: Serialize + DeserializeOwned + Default {
    /// Store name used in errors and logs.
    const NAME: &'static str;

    /// Rebuild the aggregate from the collection alone.
    fn recompute(&mut self);

    /// Stamp the document with the time of the last write.
    fn touch(&mut self, at: DateTime<Utc>);
}

/// Typed handle to one store file.
#[derive(Clone, Debug)]
pub struct JsonFileStore<D> {
    path: PathBuf,
    _document: PhantomData<D>,
}

impl<D: StoreDocument> JsonFileStore<D> {
    /// Store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _document: PhantomData,
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document; a missing file is an empty document, a corrupt one is an error.
    pub fn load(&self) -> Result<D, PipelineError> {
        load_document(&self.path, D::NAME)
    }

    /// Apply `mutation`, recompute the aggregate, and persist atomically.
    pub fn mutate<R>(&self, mutation: impl FnOnce(&mut D) -> R) -> Result<R, PipelineError> {
        let mut document = self.load()?;
        let output = mutation(&mut document);
        document.recompute();
        document.touch(Utc::now());
        save_document(&self.path, D::NAME, &document)?;
        debug!(
            store = D::NAME,
            path = %self.path.display(),
            "[videos:store] document saved"
        );
        Ok(output)
    }
}

/// Read and deserialize a store file.
pub fn load_document<D>(path: &Path, store: &'static str) -> Result<D, PipelineError>
where
    D: DeserializeOwned + Default,
{
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(D::default()),
        Err(err) => {
            return Err(PipelineError::store(
                store,
                format!("failed to read {}: {err}", path.display()),
            ));
        }
    };
    if raw.trim().is_empty() {
        return Ok(D::default());
    }
    serde_json::from_str(&raw).map_err(|err| {
        PipelineError::store(store, format!("corrupt document {}: {err}", path.display()))
    })
}

/// Serialize `document` to a sibling temp file and rename it over `path`.
pub fn save_document<D: Serialize>(
    path: &Path,
    store: &'static str,
    document: &D,
) -> Result<(), PipelineError> {
    let io_err = |err: std::io::Error| {
        PipelineError::store(store, format!("failed to write {}: {err}", path.display()))
    };
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(io_err)?;
    let mut temp = NamedTempFile::new_in(parent).map_err(io_err)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, document)
            .map_err(|err| PipelineError::store(store, format!("serialize failed: {err}")))?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)?;
    }
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        items: Vec<u32>,
        sum: u32,
        last_updated: Option<DateTime<Utc>>,
    }

    impl StoreDocument for Counter {
        const NAME: &'static str = "counter";

        fn recompute(&mut self) {
            self.sum = self.items.iter().sum();
        }

        fn touch(&mut self, at: DateTime<Utc>) {
            self.last_updated = Some(at);
        }
    }

    #[test]
    fn mutate_persists_and_recomputes() {
        let dir = tempdir().unwrap();
        let store: JsonFileStore<Counter> = JsonFileStore::new(dir.path().join("nested/counter.json"));
        assert_eq!(store.load().unwrap(), Counter::default());

        store.mutate(|doc| doc.items.push(3)).unwrap();
        store.mutate(|doc| doc.items.push(4)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.items, vec![3, 4]);
        assert_eq!(loaded.sum, 7);
        assert!(loaded.last_updated.is_some());
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("nested")).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn corrupt_documents_are_store_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counter.json");
        fs::write(&path, "{ truncated").unwrap();
        let store: JsonFileStore<Counter> = JsonFileStore::new(&path);
        let err = store.mutate(|doc| doc.items.push(1)).unwrap_err();
        assert!(matches!(err, PipelineError::Store { store: "counter", .. }));
        assert!(!err.is_item_scoped());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ truncated");
    }
}
