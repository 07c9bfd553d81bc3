//! Engine module: hashing, path tools, CLI plumbing

pub mod arg_parser;
pub mod cli;
pub mod hashing;
pub mod output;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use hashing::{hash_bytes, hash_file};
pub use tools::{glob_match, path_relative_to, result_key, should_include_in_walk};
