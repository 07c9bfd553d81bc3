//! Source stage: walk the tree depth-first and stream regular-file paths to the worker pool.

use crossbeam_channel::{Receiver, Sender, bounded, select};
use log::debug;
use std::thread::{self, JoinHandle};
use walkdir::WalkDir;

use crate::WorkItem;
use crate::engine::tools::should_include_in_walk;
use crate::error::PipelineError;

use super::cancel::CancelToken;
use super::context::WalkContext;

/// Handles for a running walk.
///
/// `errors` carries at most one value: the first traversal error, or
/// [`PipelineError::WalkCanceled`]. It disconnects empty when the walk completed.
/// Read it only after `items` is drained; the walk sends its error before closing `items`.
pub struct WalkHandles {
    pub items: Receiver<WorkItem>,
    pub errors: Receiver<PipelineError>,
    /// Joins to the number of items sent.
    pub handle: JoinHandle<usize>,
}

/// Start the walk on its own thread.
pub fn spawn_walk(ctx: WalkContext, cancel: CancelToken, channel_cap: usize) -> WalkHandles {
    let (items_tx, items) = bounded::<WorkItem>(channel_cap);
    let (errors_tx, errors) = bounded::<PipelineError>(1);
    let handle = thread::spawn(move || {
        let (count, outcome) = run_walk_loop(&ctx, &items_tx, &cancel);
        if let Err(e) = outcome {
            debug!("walk: stopped after {} items: {}", count, e);
            // Capacity 1 and a single send: never blocks.
            let _ = errors_tx.send(e);
        } else {
            debug!("walk: done, {} items", count);
        }
        drop(items_tx);
        count
    });
    WalkHandles {
        items,
        errors,
        handle,
    }
}

/// Walk `ctx.root` depth-first, sending each included regular file on `items_tx`.
///
/// Every send races `cancel`; the first traversal error ends the walk. Returns the number
/// of items sent and how the walk ended.
pub fn run_walk_loop(
    ctx: &WalkContext,
    items_tx: &Sender<WorkItem>,
    cancel: &CancelToken,
) -> (usize, Result<(), PipelineError>) {
    let mut count = 0_usize;
    // Excluded directories are pruned, not just skipped.
    let walker = WalkDir::new(&ctx.root)
        .follow_links(ctx.follow_links)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || should_include_in_walk(e.path(), &ctx.exclude, ctx.skip_os_clutter)
        });
    for entry in walker {
        if cancel.is_cancelled() {
            return (count, Err(PipelineError::WalkCanceled));
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => return (count, Err(PipelineError::from_walk(err, &ctx.root))),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        select! {
            send(items_tx, path) -> res => {
                if res.is_err() {
                    // Every worker is gone; nobody will read further items.
                    return (count, Err(PipelineError::WalkCanceled));
                }
                count += 1;
            }
            recv(cancel.done()) -> _ => return (count, Err(PipelineError::WalkCanceled)),
        }
    }
    (count, Ok(()))
}
