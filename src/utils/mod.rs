pub mod config;
pub mod digestree_toml;
pub mod fd_limit;
pub mod logger;

pub use config::*;
pub use fd_limit::{
    FDS_PER_WORKER, determine_threads_given_fd_limit, max_open_fds, max_workers_by_fd_limit,
};
pub use logger::setup_logging;
