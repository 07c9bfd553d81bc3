//! Public and internal types for the digestree API and pipeline.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::PipelineError;
use crate::pipeline::CancelToken;

/// 32-byte blake3 digest of a file's contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl From<blake3::Hash> for Digest {
    fn from(h: blake3::Hash) -> Self {
        Digest(*h.as_bytes())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

/// Map of path → digest for every regular file under the processed root.
///
/// Keys are absolute (canonical root joined with the walked path) unless
/// [`DigestOpts::relative_paths`] is set, in which case they are relative to the root.
pub type Digests = HashMap<PathBuf, Digest>;

/// One file to digest, as emitted by the walk.
pub type WorkItem = PathBuf;

/// Outcome of digesting one [`WorkItem`]: the digest or the reason it failed, never both.
#[derive(Debug)]
pub struct ResultRecord {
    pub path: PathBuf,
    pub outcome: Result<Digest, PipelineError>,
}

/// Lib options for [`digest_tree`](crate::digest_tree).
#[derive(Clone, Debug, Default)]
pub struct DigestOpts {
    /// Worker pool size. When None, derived from available threads and the FD limit.
    pub num_threads: Option<usize>,
    /// Cap on files open at once across all workers (admission semaphore).
    /// None = no cap beyond the pool size.
    pub max_open_files: Option<usize>,
    /// How long a worker waits for an admission permit. None =
    /// [`PERMIT_TIMEOUT`](crate::utils::config::PERMIT_TIMEOUT).
    ///
    /// Permits are held for a whole file read, so a read that outlasts this timeout
    /// while others wait fails those waiters with [`PipelineError::Admission`] and
    /// aborts the run. Size it above the slowest expected file read.
    pub permit_timeout: Option<Duration>,
    /// Follow symbolic links.
    pub follow_links: bool,
    /// Exclude patterns (glob syntax, e.g. `target`, `*.log`). Empty = every regular file.
    pub exclude: Vec<String>,
    /// Also skip OS clutter files (`.DS_Store`, `Thumbs.db`, `._*`, ...). Off by default.
    pub skip_os_clutter: bool,
    /// Key results by path relative to the root.
    pub relative_paths: bool,
    /// Item and record channel capacity. None =
    /// [`StreamingChannelCap::DEFAULT`](crate::utils::config::StreamingChannelCap::DEFAULT).
    pub channel_cap: Option<usize>,
    /// External cancellation (e.g. Ctrl+C). Cancelling it fails the run with
    /// [`PipelineError::Canceled`].
    pub cancel: Option<CancelToken>,
}

impl From<&Opts> for DigestOpts {
    fn from(o: &Opts) -> Self {
        DigestOpts {
            num_threads: o.num_threads,
            max_open_files: o.max_open_files,
            permit_timeout: o.permit_timeout,
            follow_links: o.follow_links,
            exclude: o.exclude.clone(),
            skip_os_clutter: o.skip_os_clutter,
            relative_paths: o.relative_paths,
            channel_cap: None,
            cancel: None,
        }
    }
}

/// Full options (CLI). Use [`DigestOpts`] for lib.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Override worker thread count.
    pub num_threads: Option<usize>,
    /// Admission cap on concurrently open files.
    pub max_open_files: Option<usize>,
    /// Admission permit timeout.
    pub permit_timeout: Option<Duration>,
    /// Follow symbolic links.
    pub follow_links: bool,
    /// Exclude patterns (glob syntax).
    pub exclude: Vec<String>,
    /// Skip OS clutter files.
    pub skip_os_clutter: bool,
    /// Print paths relative to the root.
    pub relative_paths: bool,
    /// Print a JSON object instead of `<hex>  <path>` lines.
    pub json: bool,
    /// Show progress counter and debug logs.
    pub verbose: bool,
}
