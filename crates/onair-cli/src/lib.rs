//! Command-line player for onair radio programs.
//!
//! `main.rs` is the composition root; [`bootstrap`] wires the cache,
//! synthesis gateway and audio devices, and [`handlers`] run the commands.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod paths;
pub mod presentation;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{CacheCommand, Commands, PlayArgs};
pub use error::CliError;
pub use parser::Cli;
