//! CLI command definitions for the `cadence` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod run;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use run::RunArgs;

/// Run multi-agent workflows against a coding-agent session.
#[derive(Parser)]
#[command(name = "cadence", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow to an outcome, resuming from the state file if present.
    Run(RunArgs),

    /// Parse and validate a workflow definition without running it.
    Validate {
        /// Path to the workflow file (.json, otherwise YAML).
        #[arg(short, long)]
        workflow: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_validate_with_global_flags() {
        let cli = Cli::try_parse_from(["cadence", "validate", "-w", "flow.yaml", "--json", "-vv"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Validate { workflow } if workflow == PathBuf::from("flow.yaml")
        ));
    }

    #[test]
    fn test_run_requires_workflow() {
        assert!(Cli::try_parse_from(["cadence", "run"]).is_err());
    }
}
