//! Cadence CLI entry point.
//!
//! Binary name: `cadence`
//!
//! Parses CLI arguments, sets up tracing, then dispatches to the run or
//! validate command.

mod cli;

use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity; RUST_LOG wins when set.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,cadence_core=debug,cadence_infra=debug",
        _ => "trace",
    };
    cadence_observe::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let outcome = match cli.command {
        Commands::Run(args) => cli::run::handle_run(args, cli.json).await,
        Commands::Validate { workflow } => cli::validate::handle_validate(&workflow, cli.json),
    };

    cadence_observe::shutdown_tracing();
    outcome
}
