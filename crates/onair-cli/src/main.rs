//! CLI entry point - the composition root.
//!
//! Bootstrap wires the infrastructure; command dispatch routes to handlers.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use onair_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = CliConfig::with_defaults(cli.cache_db)?;

    match cli.command {
        Commands::Play(args) => {
            let ctx = bootstrap(config).await?;
            handlers::play::execute(&ctx, args).await
        }
        Commands::Cache { command } => {
            config.sweep_on_start = false;
            let ctx = bootstrap(config).await?;
            handlers::cache::execute(&ctx, command).await
        }
    }
}
