//! Digestree CLI: print `<hex digest>  <path>` for every file under a directory.

use anyhow::Result;
use clap::Parser;
use digestree::engine::arg_parser::Cli;
use digestree::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
