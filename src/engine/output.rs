//! Render a digest map for the CLI: `<hex>  <path>` lines or a JSON object, sorted by path.

use anyhow::Result;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use crate::{Digest, Digests};

/// Entries sorted by path.
pub fn sorted_entries(digests: &Digests) -> Vec<(&PathBuf, &Digest)> {
    let mut entries: Vec<_> = digests.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Write one `<hex digest>  <path>` line per file.
pub fn write_lines<W: Write>(out: &mut W, digests: &Digests) -> Result<()> {
    for (path, digest) in sorted_entries(digests) {
        writeln!(out, "{}  {}", digest, path.display())?;
    }
    Ok(())
}

/// Write a pretty JSON object `{ "<path>": "<hex digest>", ... }` with sorted keys.
pub fn write_json<W: Write>(out: &mut W, digests: &Digests) -> Result<()> {
    let map: BTreeMap<String, String> = digests
        .iter()
        .map(|(path, digest)| (path.display().to_string(), digest.to_hex()))
        .collect();
    serde_json::to_writer_pretty(&mut *out, &map)?;
    writeln!(out)?;
    Ok(())
}
