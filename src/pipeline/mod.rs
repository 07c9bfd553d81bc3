//! Pipeline components: cancellation, walk, digest workers, fan-in, aggregation.

pub mod aggregate;
pub mod cancel;
pub mod context;
pub mod digest;
pub mod merge;
pub mod walk;

pub use aggregate::{
    PipelineHandles, digest_tree_with_callback, join_stages, process_tree_with_opts,
    start_pipeline,
};
pub use cancel::{CallbackId, CancelOnDrop, CancelToken};
pub use context::{PipelineTuning, WalkContext};
pub use digest::{WorkerPool, digest_item, spawn_digest_workers};
pub use merge::{Merged, merge};
pub use walk::{WalkHandles, run_walk_loop, spawn_walk};
