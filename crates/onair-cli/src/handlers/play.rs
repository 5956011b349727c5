//! Play command handler.
//!
//! Streams now-playing lines while the session runs. Ctrl-C stops the
//! session cooperatively and prints where to resume.

use std::path::Path;

use anyhow::Result;
use onair_core::Program;
use onair_playback::SessionOutcome;
use tracing::info;

use crate::bootstrap::CliContext;
use crate::commands::PlayArgs;
use crate::error::CliError;
use crate::presentation::format_event;

pub async fn execute(ctx: &CliContext, args: PlayArgs) -> Result<()> {
    let program = load_program(&args.program)?;
    let settings = args.session_settings()?;
    let (orchestrator, mut events) = ctx.orchestrator(&args.tts_config())?;

    println!(
        "Playing {} ({} chunks in {} sections)",
        args.program.display(),
        program.chunk_count(),
        program.sections.len()
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(line) = format_event(&event) {
                println!("{line}");
            }
        }
    });

    let result = {
        let session = orchestrator.play(&program, &settings, args.from);
        tokio::pin!(session);
        tokio::select! {
            result = &mut session => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping playback");
                orchestrator.request_stop();
                session.await
            }
        }
    };

    // Closes the event channel so the printer drains and exits.
    drop(orchestrator);
    let _ = printer.await;

    match result.map_err(CliError::from)? {
        SessionOutcome::Completed => println!("Program finished."),
        SessionOutcome::Stopped { at } => {
            println!("Stopped at {at}. Resume with: onair play {} --from {at}", args.program.display());
        }
    }
    Ok(())
}

/// Read a program from a JSON file.
pub fn load_program(path: &Path) -> Result<Program, CliError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| CliError::Program(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&json)
        .map_err(|e| CliError::Program(format!("{} is not a valid program: {e}", path.display())))
}
