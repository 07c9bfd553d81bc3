use clap::Parser;
use std::path::PathBuf;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Digest every file under a directory with a bounded worker pool.
#[derive(Clone, Parser)]
#[command(name = "digestree")]
#[command(about = "Print a blake3 digest for every file under DIR, sorted by path.")]
pub struct Cli {
    /// Directory to digest. Default: current directory.
    #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
    pub dir: PathBuf,

    /// Number of digest workers. Default: available threads, capped.
    #[arg(long, short = 't', value_parser = clap::value_parser!(usize))]
    pub threads: Option<usize>,

    /// Cap on files open at once across all workers.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub max_open_files: Option<usize>,

    /// Seconds a worker waits for an open-file permit before failing the run.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub permit_timeout: Option<u64>,

    /// Follow symbolic links.
    #[arg(long, short = 'f', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub follow_links: Option<bool>,

    /// Exclude patterns (glob syntax). Can specify multiple: -e pattern1 pattern2 pattern3
    #[arg(long, short = 'e', num_args = 1..)]
    pub exclude: Vec<String>,

    /// Skip OS clutter files (.DS_Store, Thumbs.db, ._*). Default: true.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub skip_clutter: Option<bool>,

    /// Print paths relative to DIR.
    #[arg(long, short = 'r', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub relative: Option<bool>,

    /// Print a JSON object (path → hex digest) instead of lines.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub json: Option<bool>,

    /// Verbose output (debug logs and a progress counter on stderr).
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
