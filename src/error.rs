//! Error types for the digest pipeline and the admission semaphore.
//!
//! The Aggregator is the only place that turns a stage failure into a failed run,
//! so every stage reports through [`PipelineError`]. [`SemaphoreError`] stays local to
//! whoever holds the semaphore.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a whole `process_tree` run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The walk could not read part of the tree (or the root itself).
    #[error("traversal failed at '{}': {source}", .path.display())]
    Traversal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The walk stopped because the run was cancelled elsewhere.
    #[error("walk canceled")]
    WalkCanceled,

    /// A single file could not be read or hashed.
    #[error("failed to digest '{}': {source}", .path.display())]
    Item {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A worker could not get an admission permit before reading a file.
    #[error("no admission for '{}': {source}", .path.display())]
    Admission {
        path: PathBuf,
        #[source]
        source: SemaphoreError,
    },

    /// The caller cancelled the run before it completed.
    #[error("digest run canceled")]
    Canceled,

    /// A pipeline thread panicked.
    #[error("{0} thread panicked")]
    Stage(&'static str),
}

impl PipelineError {
    /// Build a traversal error from a walkdir error, keeping the io cause when there is one.
    pub fn from_walk(err: walkdir::Error, fallback: &std::path::Path) -> Self {
        let path = err
            .path()
            .map(PathBuf::from)
            .unwrap_or_else(|| fallback.to_path_buf());
        let msg = err.to_string();
        let source = err.into_io_error().unwrap_or_else(|| io::Error::other(msg));
        PipelineError::Traversal { path, source }
    }

    /// True for failures caused by cancellation rather than by the tree or its files.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::WalkCanceled | PipelineError::Canceled)
    }
}

/// Admission semaphore protocol errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemaphoreError {
    /// Every permit stayed taken for the whole timeout.
    #[error("no permits available after {timeout:?}")]
    NoPermitsAvailable { timeout: Duration },

    /// Release without a matching acquire.
    #[error("cannot release a permit that was never acquired")]
    IllegalRelease,
}
