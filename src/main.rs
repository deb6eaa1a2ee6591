//! Filequeue CLI: scan directories and publish file info to RabbitMQ.

use anyhow::Result;
use clap::Parser;
use filequeue::engine::arg_parser::Cli;
use filequeue::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    let stats = handle_run(&cli)?;
    log::debug!("Total time: {:?} ({} candidates)", start_time.elapsed(), stats.total());
    Ok(())
}
