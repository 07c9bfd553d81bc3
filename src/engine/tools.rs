//! Path and filter utilities

use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Convert absolute path to relative path from base
pub fn path_relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Check if a file should be excluded based on OS-specific clutter files
pub fn is_os_hidden_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        match name {
            // macOS
            ".DS_Store" | ".AppleDouble" | ".LSOverride" => true,
            // Windows
            "Thumbs.db" | "ehthumbs.db" | "Desktop.ini" => true,
            // Linux
            ".directory" => true,
            // macOS resource forks
            _ => name.starts_with("._"),
        }
    } else {
        false
    }
}

/// Returns true if the entry at `path` should be walked (not excluded).
/// OS clutter files are only dropped when `skip_os_clutter` is set.
pub fn should_include_in_walk(
    path: &Path,
    exclude_patterns: &[String],
    skip_os_clutter: bool,
) -> bool {
    if skip_os_clutter && is_os_hidden_file(path) {
        return false;
    }
    if exclude_patterns.is_empty() {
        return true;
    }
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return true,
    };
    let path_str = path.to_str().unwrap_or("");
    !exclude_patterns
        .iter()
        .any(|pattern| glob_match(pattern, name) || glob_match(pattern, path_str))
}

/// Simple glob pattern matching (supports * and ?)
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob_match_chars(&p, &t)
}

fn glob_match_chars(p: &[char], t: &[char]) -> bool {
    // Backtracking over the last '*' seen: linear in practice, no recursion.
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ti));
                pi += 1;
            }
            Some('?') => {
                pi += 1;
                ti += 1;
            }
            Some(&c) if c == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    pi = sp + 1;
                    ti = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Canonicalize the root. Failure here means nothing under it can be walked.
pub fn check_root_and_canonicalize(path: &Path) -> Result<PathBuf, PipelineError> {
    path.canonicalize()
        .map_err(|source| PipelineError::Traversal {
            path: path.to_path_buf(),
            source,
        })
}

/// Key used in the result map for an absolute walked path.
pub fn result_key(abs_path: &Path, root: &Path, relative: bool) -> PathBuf {
    if relative {
        path_relative_to(abs_path, root).unwrap_or_else(|| abs_path.to_path_buf())
    } else {
        abs_path.to_path_buf()
    }
}

/// True if the process is running with effective uid 0 (e.g. via sudo).
#[cfg(unix)]
pub fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    false
}
