//! Sink stage: own the run's cancellation, fold the merged record stream into [`Digests`],
//! and decide whether the run failed.
//!
//! Walk → item channel → N digest workers → N record channels → merge → aggregate.

use log::{debug, info};
use std::path::Path;
use std::thread::JoinHandle;

use crate::engine::tools::{check_root_and_canonicalize, result_key};
use crate::error::PipelineError;
use crate::{Digest, DigestOpts, Digests, Result, ResultRecord};

use super::cancel::CancelToken;
use super::context::{PipelineTuning, WalkContext};
use super::digest::spawn_digest_workers;
use super::merge::merge;
use super::walk::spawn_walk;

/// Every stage of a started run. Returned by [`start_pipeline`] for callers that want to
/// consume records themselves; [`digest_tree_with_callback`] is the usual consumer.
pub struct PipelineHandles {
    pub root: std::path::PathBuf,
    pub records: crossbeam_channel::Receiver<ResultRecord>,
    pub walk_errors: crossbeam_channel::Receiver<PipelineError>,
    pub cancel: CancelToken,
    pub walk_handle: JoinHandle<usize>,
    pub worker_handles: Vec<JoinHandle<usize>>,
    pub merge_handle: JoinHandle<()>,
}

impl PipelineHandles {
    /// Fold the record stream into [`Digests`] and decide whether the run failed.
    ///
    /// The first failing record cancels the run and is returned at once; in-flight results
    /// after it are discarded without waiting. A traversal error is only consulted after
    /// the record stream drains, and overrides an otherwise complete map.
    pub fn collect<F>(&self, relative_paths: bool, mut on_record: F) -> Result<Digests>
    where
        F: FnMut(&Path, &Digest),
    {
        let mut digests = Digests::new();
        for record in self.records.iter() {
            match record.outcome {
                Ok(digest) => {
                    let key = result_key(&record.path, &self.root, relative_paths);
                    on_record(&key, &digest);
                    digests.insert(key, digest);
                }
                Err(e) => {
                    debug!("aggregate: first failure after {} digests: {}", digests.len(), e);
                    self.cancel.cancel();
                    return Err(e);
                }
            }
        }

        // The merge also closes when cancellation cut the forwarders short.
        if self.cancel.is_cancelled() {
            info!("digest run canceled after {} files", digests.len());
            return Err(PipelineError::Canceled);
        }
        match self.walk_errors.recv() {
            Ok(e) if e.is_cancellation() => Err(PipelineError::Canceled),
            Ok(e) => Err(e),
            Err(_) => {
                debug!("aggregate: {} digests", digests.len());
                Ok(digests)
            }
        }
    }

    /// Cancel the run and wait for every stage thread to exit.
    pub fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        drop(self.records);
        join_stages(self.walk_handle, self.worker_handles, self.merge_handle)
    }
}

/// Join walk, workers, and merge. Reports the first stage that panicked.
pub fn join_stages(
    walk_handle: JoinHandle<usize>,
    worker_handles: Vec<JoinHandle<usize>>,
    merge_handle: JoinHandle<()>,
) -> Result<()> {
    let mut panicked = None;
    if walk_handle.join().is_err() {
        panicked.get_or_insert("walk");
    }
    for h in worker_handles {
        if h.join().is_err() {
            panicked.get_or_insert("digest worker");
        }
    }
    if merge_handle.join().is_err() {
        panicked.get_or_insert("merge");
    }
    match panicked {
        Some(stage) => Err(PipelineError::Stage(stage)),
        None => Ok(()),
    }
}

/// Canonicalize `root` and start walk, workers, and merge under `cancel`.
///
/// Nothing is spawned when the root cannot be canonicalized.
pub fn start_pipeline(
    root: &Path,
    opts: &DigestOpts,
    cancel: CancelToken,
) -> Result<PipelineHandles> {
    let root = check_root_and_canonicalize(root)?;
    let tuning = PipelineTuning::from_opts(opts);
    debug!("pipeline tuning: {:?}", tuning);

    let walk = spawn_walk(
        WalkContext::new(root.clone(), opts),
        cancel.clone(),
        tuning.channel_cap,
    );
    let pool = spawn_digest_workers(
        tuning.num_threads,
        &walk.items,
        &cancel,
        tuning.admission(),
        tuning.channel_cap,
    );
    // Workers hold their own clones; dropping ours lets a closed walk end them.
    drop(walk.items);
    let merged = merge(pool.outputs, &cancel, tuning.channel_cap);

    Ok(PipelineHandles {
        root,
        records: merged.output,
        walk_errors: walk.errors,
        cancel,
        walk_handle: walk.handle,
        worker_handles: pool.handles,
        merge_handle: merged.closer,
    })
}

/// Run the whole pipeline and return the path → digest map, or the first failure.
///
/// The run's cancellation is signalled on every return path, so upstream threads are
/// released even when this returns early. Stage threads are not joined.
pub fn digest_tree_with_callback<F>(
    root: &Path,
    opts: &DigestOpts,
    on_record: F,
) -> Result<Digests>
where
    F: FnMut(&Path, &Digest),
{
    let cancel = match opts.cancel {
        Some(ref external) => external.child(),
        None => CancelToken::new(),
    };
    let _cancel_on_exit = cancel.drop_guard();

    let handles = start_pipeline(root, opts, cancel)?;
    handles.collect(opts.relative_paths, on_record)
}

/// [`digest_tree_with_callback`] without a callback.
pub fn process_tree_with_opts(root: &Path, opts: &DigestOpts) -> Result<Digests> {
    digest_tree_with_callback(root, opts, |_, _| {})
}
