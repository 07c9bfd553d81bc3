//! Pipeline context and tuning: shared data passed into the walk thread and the worker pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::DigestOpts;
use crate::semaphore::Semaphore;
use crate::utils::config::{PERMIT_TIMEOUT, StreamingChannelCap, WorkerThreadLimits};
use crate::utils::fd_limit::determine_threads_given_fd_limit;

/// Tuning derived from options, available threads, and the FD limit.
#[derive(Clone, Debug)]
pub struct PipelineTuning {
    pub num_threads: usize,
    /// Capacity for item and record channels.
    pub channel_cap: usize,
    /// Admission cap on open files; None when every worker may read at once.
    pub max_open_files: Option<usize>,
    pub permit_timeout: Duration,
}

impl PipelineTuning {
    /// Resolve tuning from `opts`. An explicit thread count is honoured (min 1); the
    /// default pool is sized from rayon's thread count and capped by the FD limit.
    pub fn from_opts(opts: &DigestOpts) -> Self {
        let num_threads = match opts.num_threads {
            Some(n) => n.max(1),
            None => {
                determine_threads_given_fd_limit(WorkerThreadLimits::current().default_workers())
            }
        };
        let channel_cap = opts
            .channel_cap
            .unwrap_or(StreamingChannelCap::DEFAULT)
            .min(StreamingChannelCap::MAX);
        PipelineTuning {
            num_threads,
            channel_cap,
            max_open_files: opts.max_open_files.map(|n| n.max(1)),
            permit_timeout: opts.permit_timeout.unwrap_or(PERMIT_TIMEOUT),
        }
    }

    /// Admission semaphore for the worker pool, when an open-file cap is set and
    /// actually smaller than the pool.
    pub fn admission(&self) -> Option<Arc<Semaphore>> {
        self.max_open_files
            .filter(|&cap| cap < self.num_threads)
            .map(|cap| Arc::new(Semaphore::new(cap, self.permit_timeout)))
    }
}

/// Shared context for the walk thread.
#[derive(Clone, Debug)]
pub struct WalkContext {
    /// Canonical root.
    pub root: PathBuf,
    pub exclude: Vec<String>,
    pub skip_os_clutter: bool,
    pub follow_links: bool,
}

impl WalkContext {
    pub fn new(root: PathBuf, opts: &DigestOpts) -> Self {
        WalkContext {
            root,
            exclude: opts.exclude.clone(),
            skip_os_clutter: opts.skip_os_clutter,
            follow_links: opts.follow_links,
        }
    }
}
