//! CLI run handler: merge config sources, wire Ctrl+C to cancellation, digest, print.

use anyhow::{Context, Result};
use log::{debug, info};
use std::io::Write;
use std::time::Duration;

use crate::engine::arg_parser::Cli;
use crate::engine::output::{write_json, write_lines};
use crate::engine::progress::{ProgressTicker, create_counter};
use crate::pipeline::CancelToken;
use crate::utils::config::PackagePaths;
use crate::utils::digestree_toml::{apply_file_to_opts, load_digestree_toml};
use crate::utils::setup_logging;
use crate::{Digest, DigestOpts, Opts, digest_tree};

/// Build opts: defaults, then `.digestree.toml` in the target dir, then CLI flags.
///
/// Unlike the library defaults, the CLI skips OS clutter unless told otherwise and never
/// digests its own config file.
pub fn setup_opts(cli: &Cli) -> Opts {
    let mut opts = Opts {
        skip_os_clutter: true,
        ..Opts::default()
    };
    if let Some(file) = load_digestree_toml(&cli.dir) {
        apply_file_to_opts(&file, &mut opts);
    }
    if cli.threads.is_some() {
        opts.num_threads = cli.threads;
    }
    if cli.max_open_files.is_some() {
        opts.max_open_files = cli.max_open_files;
    }
    if let Some(secs) = cli.permit_timeout {
        opts.permit_timeout = Some(Duration::from_secs(secs));
    }
    if !cli.exclude.is_empty() {
        opts.exclude = cli.exclude.clone();
    }
    if let Some(v) = cli.follow_links {
        opts.follow_links = v;
    }
    if let Some(v) = cli.skip_clutter {
        opts.skip_os_clutter = v;
    }
    if let Some(v) = cli.relative {
        opts.relative_paths = v;
    }
    if let Some(v) = cli.json {
        opts.json = v;
    }
    if let Some(v) = cli.verbose {
        opts.verbose = v;
    }
    opts.exclude.extend(PackagePaths::get().default_exclude_patterns());
    opts
}

/// Digest `cli.dir` and print the result to stdout. Errors propagate to `main` (non-zero exit).
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli);
    setup_logging(opts.verbose);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.cancel() {
            info!("Ctrl+C received; cancelling");
        }
    })
    .context("set Ctrl+C handler")?;

    let lib_opts = DigestOpts {
        cancel: Some(cancel),
        ..DigestOpts::from(&opts)
    };

    let mut ticker = opts
        .verbose
        .then(|| ProgressTicker::new(&create_counter("Digesting")));
    let on_record = |_: &std::path::Path, _: &Digest| {
        if let Some(t) = ticker.as_mut() {
            t.tick();
        }
    };
    let result = digest_tree(&cli.dir, &lib_opts, Some(on_record));
    if let Some(t) = ticker {
        t.finish();
        eprintln!();
    }
    let digests = result.with_context(|| format!("digest {}", cli.dir.display()))?;
    debug!("{} files digested", digests.len());

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    if opts.json {
        write_json(&mut out, &digests)?;
    } else {
        write_lines(&mut out, &digests)?;
    }
    out.flush()?;
    Ok(())
}
