//! Digestree: digest every file under a directory tree with a bounded, cancelable pipeline.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod semaphore;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use error::{PipelineError, SemaphoreError};
pub use pipeline::CancelToken;
pub use semaphore::{Permit, Semaphore};

use log::debug;
use std::path::Path;

/// Result alias used by public digestree API
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Digest every regular file under `root` with default options.
///
/// Returns the complete path → digest map, or the first failure (never a partial map).
pub fn process_tree(root: &Path) -> Result<Digests> {
    digest_tree(root, &DigestOpts::default(), None::<fn(&Path, &Digest)>)
}

/// Single entry point: digest `root` with `opts`.
///
/// - **`on_record: None`** → just collect the map.
/// - **`on_record: Some(f)`** → `f` is invoked for each digest as the aggregator folds it in
///   (path as it will appear in the map). Keep it fast; it runs on the aggregating thread.
pub fn digest_tree<F>(root: &Path, opts: &DigestOpts, on_record: Option<F>) -> Result<Digests>
where
    F: FnMut(&Path, &Digest),
{
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    match on_record {
        None => pipeline::process_tree_with_opts(root, opts),
        Some(f) => pipeline::digest_tree_with_callback(root, opts, f),
    }
}
