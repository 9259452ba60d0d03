//! `cadence validate`: check a workflow definition without running it.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use cadence_core::workflow::definition::load_workflow_file;
use cadence_types::workflow::WorkflowDefinition;

/// Handle `cadence validate`.
pub fn handle_validate(path: &Path, json: bool) -> Result<()> {
    let definition = load_workflow_file(path)
        .with_context(|| format!("invalid workflow {}", path.display()))?;
    let summary = summarize(&definition);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} is valid",
        style("✓").green().bold(),
        style(path.display()).cyan()
    );
    println!();
    println!("  Roles:      {}", summary["roles"]);
    println!("  Bootstrap:  {} step(s)", summary["bootstrapSteps"]);
    println!("  Round:      {} step(s)", summary["roundSteps"]);
    println!("  Final:      {} step(s)", summary["finalSteps"]);
    match definition.flow.round.max_rounds {
        Some(max) => println!("  Max rounds: {max}"),
        None => println!("  Max rounds: {}", style("config default").dim()),
    }
    println!();
    Ok(())
}

fn summarize(definition: &WorkflowDefinition) -> serde_json::Value {
    let flow = &definition.flow;
    serde_json::json!({
        "valid": true,
        "roles": definition.roles.len(),
        "bootstrapSteps": flow.bootstrap.as_ref().map_or(0, |p| p.steps().len()),
        "roundSteps": flow.round.steps.len(),
        "finalSteps": flow.final_phase.as_ref().map_or(0, |p| p.steps().len()),
        "maxRounds": flow.round.max_rounds,
        "stateVariables": definition.state.initial.len(),
    })
}
