//! crate-minder — headless audio auto-tagging and library-organizing daemon.
//!
//! Watches one or more directories for newly-downloaded audio files,
//! identifies them via acoustic fingerprinting and metadata lookup, writes
//! tags and cover art, and moves them into an organized library layout.

pub mod album_batch;
pub mod cli;
pub mod config;
pub mod duration_matcher;
pub mod enrichment;
pub mod error;
pub mod folder_cache;
pub mod health;
pub mod model;
pub mod monitor;
pub mod organizer;
pub mod processed_log;
pub mod processor;
pub mod quickscan;
pub mod rate_limiter;
pub mod tagio;
pub mod version_match;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("crate_minder=info".parse().unwrap()))
        .init();

    if cli::run_command(&args)? {
        return Ok(());
    }

    println!("no command given; run with --help to see available subcommands");
    Ok(())
}
