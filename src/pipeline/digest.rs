//! Worker stage: a fixed pool of digesters sharing the walk's item channel.
//!
//! Each worker owns its own output channel; the pool is complete when every output has
//! disconnected, which the fan-in stage turns into a single closed stream.

use crossbeam_channel::{Receiver, Sender, bounded, select};
use log::debug;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::engine::hashing::hash_file;
use crate::error::PipelineError;
use crate::semaphore::Semaphore;
use crate::{Digest, ResultRecord, WorkItem};

use super::cancel::CancelToken;

/// Running worker pool: one output receiver and one join handle per worker.
pub struct WorkerPool {
    pub outputs: Vec<Receiver<ResultRecord>>,
    /// Each joins to the number of records that worker delivered.
    pub handles: Vec<JoinHandle<usize>>,
}

/// Spawn exactly `num_threads` digest workers (min 1) reading from `items`.
///
/// When `admission` is set, every file read holds a permit from it for the duration of the read.
pub fn spawn_digest_workers(
    num_threads: usize,
    items: &Receiver<WorkItem>,
    cancel: &CancelToken,
    admission: Option<Arc<Semaphore>>,
    channel_cap: usize,
) -> WorkerPool {
    let num_threads = num_threads.max(1);
    debug!(
        "spawning {} digest workers (admission cap: {:?})",
        num_threads,
        admission.as_ref().map(|s| s.capacity())
    );
    let per_worker_cap = (channel_cap / num_threads).max(1);
    let (outputs, handles) = (0..num_threads)
        .map(|id| {
            let (out_tx, out_rx) = bounded::<ResultRecord>(per_worker_cap);
            let items = items.clone();
            let cancel = cancel.clone();
            let admission = admission.clone();
            let handle = thread::spawn(move || {
                digest_worker_loop(id, items, out_tx, cancel, admission.as_deref())
            });
            (out_rx, handle)
        })
        .unzip();
    WorkerPool { outputs, handles }
}

/// Pull items until the walk closes the channel or the run is cancelled. Every item taken
/// yields exactly one record unless cancellation wins the send race.
fn digest_worker_loop(
    id: usize,
    items: Receiver<WorkItem>,
    out_tx: Sender<ResultRecord>,
    cancel: CancelToken,
    admission: Option<&Semaphore>,
) -> usize {
    let mut delivered = 0_usize;
    loop {
        let path = select! {
            recv(items) -> msg => match msg {
                Ok(path) => path,
                Err(_) => break,
            },
            recv(cancel.done()) -> _ => break,
        };
        let record = ResultRecord {
            outcome: digest_item(&path, admission),
            path,
        };
        select! {
            send(out_tx, record) -> res => {
                if res.is_err() {
                    break;
                }
                delivered += 1;
            }
            recv(cancel.done()) -> _ => break,
        }
    }
    debug!("digest worker {}: exiting after {} records", id, delivered);
    delivered
}

/// Digest one file, holding an admission permit while it is open.
pub fn digest_item(path: &Path, admission: Option<&Semaphore>) -> Result<Digest, PipelineError> {
    let _permit = match admission {
        Some(sem) => Some(
            sem.acquire_permit()
                .map_err(|source| PipelineError::Admission {
                    path: path.to_path_buf(),
                    source,
                })?,
        ),
        None => None,
    };
    hash_file(path).map_err(|source| PipelineError::Item {
        path: path.to_path_buf(),
        source,
    })
}
