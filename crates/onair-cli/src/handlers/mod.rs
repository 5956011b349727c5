//! Command handlers.
//!
//! Handlers follow the pattern `pub async fn execute(ctx: &CliContext, ...)`:
//! validate CLI input, call into the engine, print the result.

pub mod cache;
pub mod play;
