//! Progress counter for the CLI (files digested so far; total unknown while the walk streams).

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

use crate::utils::config::ProgressConsts;

pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " files"
    )))
}

/// Update progress bar if available.
/// Uses try_lock so a contended bar never stalls the aggregator; the next batch catches up.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Force a refresh of the bar (e.g. so the counter shows "0 files" immediately).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Ticks a bar once per record but only touches it every
/// [`ProgressConsts::PROGRESS_UPDATE_BATCH_SIZE`] records.
pub struct ProgressTicker {
    bar: ProgressBar,
    count: usize,
}

impl ProgressTicker {
    pub fn new(bar: &ProgressBar) -> Self {
        refresh_bar(bar);
        Self {
            bar: Arc::clone(bar),
            count: 0,
        }
    }

    pub fn tick(&mut self) {
        self.count += 1;
        if self
            .count
            .is_multiple_of(ProgressConsts::PROGRESS_UPDATE_BATCH_SIZE)
        {
            update_progress_bar(&self.bar, ProgressConsts::PROGRESS_UPDATE_BATCH_SIZE);
        }
    }

    /// Push the remainder after batched updates.
    pub fn finish(self) {
        let remaining = self.count % ProgressConsts::PROGRESS_UPDATE_BATCH_SIZE;
        if remaining > 0 {
            update_progress_bar(&self.bar, remaining);
        }
        refresh_bar(&self.bar);
    }
}
