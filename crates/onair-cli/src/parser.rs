//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Play scripted radio programs through a speech synthesizer.
#[derive(Parser)]
#[command(name = "onair")]
#[command(about = "Play scripted radio programs with synthesized speech and background music")]
#[command(version)]
pub struct Cli {
    /// Durable audio cache database
    #[arg(long = "cache-db", env = "ONAIR_CACHE_DB", global = true)]
    pub cache_db: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
