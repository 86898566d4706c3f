use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration, per-artifact processing, and store persistence failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid or inconsistent pipeline settings.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Filesystem failure while handling an artifact.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The external encoder could not be run or exited unsuccessfully.
    #[error("encoder failed for '{}': {reason}", path.display())]
    Encoder {
        /// Recording being encoded.
        path: PathBuf,
        /// Exit status or last stderr line.
        reason: String,
    },
    /// The external encoder ran past its deadline and was killed.
    #[error("encoder timed out after {seconds}s for '{}'", path.display())]
    EncoderTimeout {
        /// Recording being encoded.
        path: PathBuf,
        /// Deadline that was exceeded.
        seconds: u64,
    },
    /// Every collision suffix for an archive name is taken.
    #[error("no free archive name for '{base}' in '{}'", dir.display())]
    CollisionExhausted {
        /// Destination directory.
        dir: PathBuf,
        /// Base name before suffixes.
        base: String,
    },
    /// A JSON store could not be read or written.
    #[error("{store} store failure: {details}")]
    Store {
        /// Short store name (`catalog`, `memory`, ...).
        store: &'static str,
        /// What went wrong.
        details: String,
    },
    /// Another pipeline process holds the archive root.
    #[error("archive root is locked: {0}")]
    StoreLocked(String),
    /// Monitor mode hit its consecutive-failure limit.
    #[error("monitor gave up after {attempts} failed batches: {last_error}")]
    MonitorExhausted {
        /// Consecutive failed batches.
        attempts: u32,
        /// Message of the last failure.
        last_error: String,
    },
}

impl PipelineError {
    /// True when the error only affects the artifact being processed.
    ///
    /// Item-scoped errors are recorded in the batch report and the batch moves on;
    /// everything else aborts the run.
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            PipelineError::Io(_)
                | PipelineError::Encoder { .. }
                | PipelineError::EncoderTimeout { .. }
                | PipelineError::CollisionExhausted { .. }
        )
    }

    pub(crate) fn store(store: &'static str, details: impl Into<String>) -> Self {
        PipelineError::Store {
            store,
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_scope_follows_error_taxonomy() {
        let encoder = PipelineError::Encoder {
            path: PathBuf::from("a.webm"),
            reason: "exit status 1".into(),
        };
        assert!(encoder.is_item_scoped());
        assert!(PipelineError::Io(io::Error::other("boom")).is_item_scoped());
        assert!(
            PipelineError::CollisionExhausted {
                dir: PathBuf::from("archive"),
                base: "x".into()
            }
            .is_item_scoped()
        );

        assert!(!PipelineError::Configuration("missing".into()).is_item_scoped());
        assert!(!PipelineError::store("catalog", "corrupt").is_item_scoped());
        assert!(!PipelineError::StoreLocked("pid 1".into()).is_item_scoped());
    }

    #[test]
    fn store_error_message_names_the_store() {
        let err = PipelineError::store("memory", "unexpected EOF");
        assert_eq!(err.to_string(), "memory store failure: unexpected EOF");
    }
}
