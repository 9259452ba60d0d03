//! `cadence run`: execute a workflow against a session backend.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use console::style;
use serde_json::{Map, Value};

use cadence_core::executor::{BoxPromptExecutor, PollingExecutor, ToolCallingExecutor};
use cadence_core::tool::ToolSet;
use cadence_core::workflow::definition::load_workflow_file;
use cadence_core::workflow::engine::DONE_OUTCOME;
use cadence_core::workflow::{RunResult, WorkflowEngine};
use cadence_infra::config::{DEFAULT_CONFIG_FILE, load_config};
use cadence_infra::session::HttpSessionBackend;
use cadence_infra::state::JsonFileStateStore;
use cadence_types::config::CadenceConfig;
use cadence_types::scope::{BOOTSTRAP_COMPLETE, FINAL_COMPLETE};

/// Exit code used when the run is interrupted with Ctrl+C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Prompt executor strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutorKind {
    /// Submit to the session and poll its history for the reply.
    Polling,
    /// Drive the model turn by turn and run tool calls locally.
    Tools,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the workflow file (.json, otherwise YAML).
    #[arg(short, long)]
    pub workflow: PathBuf,

    /// Run input as key=value; values that parse as JSON are kept typed.
    #[arg(short, long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
    pub inputs: Vec<(String, Value)>,

    /// State file for checkpointing; rerun with the same path to resume.
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    /// Prompt executor strategy.
    #[arg(short, long, value_enum, default_value_t = ExecutorKind::Polling)]
    pub executor: ExecutorKind,

    /// Session to prompt (overrides `backend.session_id` from the config).
    #[arg(long, env = "CADENCE_SESSION")]
    pub session: Option<String>,

    /// Configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

/// Parse a `key=value` run input.
pub fn parse_input(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("input key is empty in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Build the executor selected on the command line.
fn build_executor(
    kind: ExecutorKind,
    config: &CadenceConfig,
    session: Option<String>,
) -> Result<BoxPromptExecutor> {
    let Some(session_id) = session.or_else(|| config.backend.session_id.clone()) else {
        bail!("no session id: pass --session or set backend.session_id in the config");
    };

    let backend = HttpSessionBackend::new(&config.backend)
        .context("failed to create session backend")?;
    let model = config.backend.model.clone();

    let executor = match kind {
        ExecutorKind::Polling => BoxPromptExecutor::new(
            PollingExecutor::with_config(backend, session_id, config.polling.clone())
                .with_model(model),
        ),
        ExecutorKind::Tools => BoxPromptExecutor::new(
            ToolCallingExecutor::new(backend, ToolSet::new(), session_id)
                .with_model(model)
                .with_config(&config.tool_loop),
        ),
    };
    Ok(executor)
}

/// Handle `cadence run`.
pub async fn handle_run(args: RunArgs, json: bool) -> Result<()> {
    let definition = load_workflow_file(&args.workflow)
        .with_context(|| format!("failed to load workflow {}", args.workflow.display()))?;
    let config = load_config(&args.config).await;

    let executor = build_executor(args.executor, &config, args.session)?;
    tracing::debug!(?executor, kind = ?args.executor, "executor ready");

    let engine = WorkflowEngine::new(executor, JsonFileStateStore::new(), config.engine);
    let inputs: Map<String, Value> = args.inputs.into_iter().collect();

    let result = tokio::select! {
        result = engine.run(&definition, inputs, args.state.as_deref()) => result?,
        _ = tokio::signal::ctrl_c() => {
            if let Some(path) = &args.state {
                eprintln!(
                    "\n  Interrupted. Rerun with --state {} to resume.",
                    path.display()
                );
            } else {
                eprintln!("\n  Interrupted.");
            }
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &RunResult) {
    let outcome = if result.outcome == DONE_OUTCOME {
        style(&result.outcome).green().bold()
    } else {
        style(&result.outcome).yellow().bold()
    };

    println!();
    println!("  {} Run {}", style("⚡").bold(), style(&result.run_id).cyan());
    println!();
    println!("  Outcome:  {outcome}");
    if !result.reason.is_empty() {
        println!("  Reason:   {}", result.reason);
    }
    println!("  Rounds:   {}", style(result.rounds.len()).bold());

    for round in &result.rounds {
        let steps: Vec<&str> = round.steps.keys().map(String::as_str).collect();
        println!(
            "    {} {}",
            style(format!("#{}", round.round)).dim(),
            steps.join(", ")
        );
    }

    let variables: Vec<_> = result
        .state
        .iter()
        .filter(|(name, _)| !matches!(name.as_str(), BOOTSTRAP_COMPLETE | FINAL_COMPLETE))
        .collect();
    if !variables.is_empty() {
        println!();
        println!("  {}", style("── State ──").dim());
        for (name, value) in variables {
            println!("  {name} = {value}");
        }
    }
    println!();
}
