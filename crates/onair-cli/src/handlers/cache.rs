//! Cache maintenance commands.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::commands::CacheCommand;

pub async fn execute(ctx: &CliContext, command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Clear => {
            ctx.cache.clear().await?;
            println!("Audio cache cleared.");
        }
        CacheCommand::Sweep => {
            let removed = ctx.cache.sweep_expired().await;
            let noun = if removed == 1 { "entry" } else { "entries" };
            println!("Removed {removed} expired {noun}.");
        }
    }
    Ok(())
}
