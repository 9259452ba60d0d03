//! Workflow definition parsing, validation, and file loading.
//!
//! Converts JSON or YAML documents into the canonical `WorkflowDefinition`
//! and validates the structural constraints the engine relies on (unique step
//! keys, known roles, resolvable jump targets).

use std::collections::HashSet;
use std::path::Path;

use cadence_types::workflow::{Condition, StepDefinition, Transition, WorkflowDefinition};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while loading a workflow definition.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// YAML/JSON parse failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a JSON string into a validated `WorkflowDefinition`.
pub fn parse_workflow_json(json: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let def: WorkflowDefinition =
        serde_json::from_str(json).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

/// Parse a YAML string into a validated `WorkflowDefinition`.
///
/// Runs `validate_definition` after deserialization, so the returned value
/// is guaranteed to be structurally valid.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let def: WorkflowDefinition =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks:
/// - At least one role exists
/// - `maxRounds` >= 1 if set
/// - The round phase has at least one step
/// - Step keys are unique within each phase
/// - Every step's role is declared
/// - Round `next` and `nextStep` targets name round steps
/// - Field conditions name a field
/// - Every transition does something (outcome, jump, or state update)
/// - The default outcome is non-empty
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if def.roles.is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow must declare at least one role".to_string(),
        ));
    }

    let round = &def.flow.round;
    if round.max_rounds == Some(0) {
        return Err(WorkflowError::ValidationError(
            "maxRounds must be >= 1".to_string(),
        ));
    }
    if round.steps.is_empty() {
        return Err(WorkflowError::ValidationError(
            "round phase must have at least one step".to_string(),
        ));
    }
    if round.default_outcome.outcome.trim().is_empty() {
        return Err(WorkflowError::ValidationError(
            "defaultOutcome.outcome must not be empty".to_string(),
        ));
    }

    let phases = [
        ("bootstrap", def.flow.bootstrap.as_ref().map(|p| p.steps())),
        ("round", Some(round.steps.as_slice())),
        ("final", def.flow.final_phase.as_ref().map(|p| p.steps())),
    ];
    for (phase, steps) in phases {
        if let Some(steps) = steps {
            validate_phase(def, phase, steps)?;
        }
    }

    // Jump targets only have meaning inside the round phase.
    let round_keys: HashSet<&str> = round.steps.iter().map(|s| s.key.as_str()).collect();
    for step in &round.steps {
        if let Some(next) = &step.next {
            if !round_keys.contains(next.as_str()) {
                return Err(WorkflowError::ValidationError(format!(
                    "step '{}' has unknown next step '{}'",
                    step.key, next
                )));
            }
        }
        for transition in step.transitions.iter().chain(step.exits.iter()) {
            if let Some(target) = &transition.next_step {
                if !round_keys.contains(target.as_str()) {
                    return Err(WorkflowError::ValidationError(format!(
                        "step '{}' has a transition to unknown step '{}'",
                        step.key, target
                    )));
                }
            }
        }
    }

    Ok(())
}

fn validate_phase(
    def: &WorkflowDefinition,
    phase: &str,
    steps: &[StepDefinition],
) -> Result<(), WorkflowError> {
    let mut seen = HashSet::new();
    for step in steps {
        if step.key.is_empty() {
            return Err(WorkflowError::ValidationError(format!(
                "{phase} step key must not be empty"
            )));
        }
        if !seen.insert(step.key.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate {phase} step key: '{}'",
                step.key
            )));
        }
        if !def.roles.contains_key(&step.role) {
            return Err(WorkflowError::ValidationError(format!(
                "step '{}' references unknown role '{}'",
                step.key, step.role
            )));
        }
        for transition in step.transitions.iter().chain(step.exits.iter()) {
            validate_transition(&step.key, transition)?;
        }
    }
    Ok(())
}

fn validate_transition(step: &str, transition: &Transition) -> Result<(), WorkflowError> {
    if let Condition::Field(cond) = &transition.condition {
        let path = cond.field.strip_prefix('@').unwrap_or(&cond.field);
        if path.trim().is_empty() {
            return Err(WorkflowError::ValidationError(format!(
                "step '{step}' has a condition without a field"
            )));
        }
        if !cond.has_comparator() {
            return Err(WorkflowError::ValidationError(format!(
                "step '{step}' has a condition on '{}' without a comparator",
                cond.field
            )));
        }
    }
    if transition.outcome.is_none()
        && transition.next_step.is_none()
        && transition.state_updates.is_empty()
    {
        return Err(WorkflowError::ValidationError(format!(
            "step '{step}' has a transition with no outcome, nextStep, or stateUpdates"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

/// Load a workflow definition from a `.json`, `.yaml` or `.yml` file.
///
/// Files with any other extension are tried as YAML, which also accepts JSON.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_workflow_json(&content),
        _ => parse_workflow_yaml(&content),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
