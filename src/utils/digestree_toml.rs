//! Load `.digestree.toml` from a directory (CLI only). Lib callers pass [`DigestOpts`](crate::DigestOpts) directly.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DigestreeToml {
    #[serde(default)]
    settings: Settings,
}

#[derive(Debug, Default, Deserialize)]
struct Settings {
    threads: Option<usize>,
    max_open_files: Option<usize>,
    /// Seconds.
    permit_timeout: Option<u64>,
    follow_links: Option<bool>,
    exclude: Option<Vec<String>>,
    skip_clutter: Option<bool>,
    relative: Option<bool>,
    json: Option<bool>,
    verbose: Option<bool>,
}

/// Load `.digestree.toml` from `dir` if present. Returns None if the file is missing, unreadable, or invalid.
pub(crate) fn load_digestree_toml(dir: &Path) -> Option<DigestreeToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_digestree_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub(crate) fn parse_digestree_toml(s: &str) -> Result<DigestreeToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($settings:expr, $opts:expr, $field:ident => $opts_field:ident) => {
        if let Some(v) = $settings.$field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI flags.
pub(crate) fn apply_file_to_opts(file: &DigestreeToml, opts: &mut Opts) {
    let s = &file.settings;
    if let Some(n) = s.threads {
        opts.num_threads = Some(n);
    }
    if let Some(n) = s.max_open_files {
        opts.max_open_files = Some(n);
    }
    if let Some(secs) = s.permit_timeout {
        opts.permit_timeout = Some(Duration::from_secs(secs));
    }
    if let Some(ref v) = s.exclude {
        opts.exclude = v.clone();
    }
    apply_file_opt!(s, opts, follow_links => follow_links);
    apply_file_opt!(s, opts, skip_clutter => skip_os_clutter);
    apply_file_opt!(s, opts, relative => relative_paths);
    apply_file_opt!(s, opts, json => json);
    apply_file_opt!(s, opts, verbose => verbose);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_values_applied() {
        let file = parse_digestree_toml(
            r#"
            [settings]
            threads = 3
            max_open_files = 2
            permit_timeout = 5
            exclude = ["target", "*.log"]
            relative = true
            skip_clutter = true
            "#,
        )
        .unwrap();
        let mut opts = Opts::default();
        apply_file_to_opts(&file, &mut opts);
        assert_eq!(opts.num_threads, Some(3));
        assert_eq!(opts.max_open_files, Some(2));
        assert_eq!(opts.permit_timeout, Some(Duration::from_secs(5)));
        assert_eq!(opts.exclude, vec!["target".to_string(), "*.log".to_string()]);
        assert!(opts.relative_paths);
        assert!(opts.skip_os_clutter);
        assert!(!opts.json);
        assert!(!opts.follow_links);
    }

    #[test]
    fn test_missing_settings_table_is_empty() {
        let file = parse_digestree_toml("").unwrap();
        let mut opts = Opts {
            verbose: true,
            ..Default::default()
        };
        apply_file_to_opts(&file, &mut opts);
        assert!(opts.verbose);
        assert_eq!(opts.num_threads, None);
    }
}
