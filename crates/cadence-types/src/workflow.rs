//! Workflow definition types for Cadence.
//!
//! A `WorkflowDefinition` is the immutable configuration a run is driven by:
//! roles (system prompts per role), an optional bootstrap phase, a round phase
//! of ordered steps with transition rules, an optional final phase, and the
//! initial state-variable templates. Definitions are authored as JSON or YAML
//! with camelCase keys:
//!
//! ```yaml
//! roles:
//!   worker: { systemPrompt: "You implement things." }
//!   verifier: { systemPrompt: "You review things.", parser: json }
//! flow:
//!   round:
//!     maxRounds: 3
//!     defaultOutcome: { outcome: exhausted, reason: "no verdict" }
//!     steps:
//!       - key: worker
//!         role: worker
//!         prompt: "Implement {{user.task}}"
//!       - key: verifier
//!         role: verifier
//!         prompt: ["Review:", "{{steps.worker.raw}}"]
//!         transitions:
//!           - condition: { field: parsed.verdict, equals: approve }
//!             outcome: approved
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// The canonical workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Role name -> role configuration.
    #[serde(default)]
    pub roles: BTreeMap<String, RoleDefinition>,
    /// Bootstrap, round and final phases.
    pub flow: FlowDefinition,
    /// Initial state-variable templates.
    #[serde(default)]
    pub state: StateDefinition,
}

/// Per-role prompt configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    /// Instructions prepended to every prompt sent under this role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// When set, the step output is always run through JSON extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser: Option<String>,
}

/// The three lifecycle phases of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    /// Runs once before the first round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<PhaseSteps>,
    pub round: RoundDefinition,
    /// Runs once after the round loop, only for the `done` outcome.
    #[serde(default, rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_phase: Option<PhaseSteps>,
}

/// A bootstrap or final phase: either a single step or an ordered list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseSteps {
    Single(Box<StepDefinition>),
    List(Vec<StepDefinition>),
}

impl PhaseSteps {
    /// The phase's steps in execution order.
    pub fn steps(&self) -> &[StepDefinition] {
        match self {
            PhaseSteps::Single(step) => std::slice::from_ref(step.as_ref()),
            PhaseSteps::List(steps) => steps,
        }
    }
}

/// The repeating round phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDefinition {
    /// Upper bound on rounds; falls back to the engine default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
    pub steps: Vec<StepDefinition>,
    /// Outcome used when no transition produced one within `max_rounds`.
    pub default_outcome: Outcome,
}

impl RoundDefinition {
    /// Look up a round step by key.
    pub fn step(&self, key: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.key == key)
    }

    /// Key of the step following `key` in declaration order.
    pub fn step_after(&self, key: &str) -> Option<&str> {
        let idx = self.steps.iter().position(|s| s.key == key)?;
        self.steps.get(idx + 1).map(|s| s.key.as_str())
    }
}

/// A terminal outcome and its (templated) reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub outcome: String,
    #[serde(default)]
    pub reason: String,
}

/// Initial state-variable templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDefinition {
    #[serde(default)]
    pub initial: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Step Definition
// ---------------------------------------------------------------------------

/// A single step in a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    /// Unique within its phase.
    pub key: String,
    /// Must name an entry in `WorkflowDefinition::roles`.
    pub role: String,
    /// Agent to address; the engine default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub prompt: PromptTemplate,
    /// Explicit successor, overriding declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<Transition>,
    /// Consulted only when no entry in `transitions` matched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exits: Vec<Transition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state_updates: BTreeMap<String, String>,
}

/// A prompt given either as one template or as parts rendered independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptTemplate {
    Single(String),
    Parts(Vec<String>),
}

impl PromptTemplate {
    pub fn parts(&self) -> &[String] {
        match self {
            PromptTemplate::Single(s) => std::slice::from_ref(s),
            PromptTemplate::Parts(parts) => parts,
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// A conditional edge out of a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub condition: Condition,
    /// Ends the round loop with this outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Continues the round at this step key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state_updates: BTreeMap<String, String>,
}

/// When a transition applies.
///
/// Serialized as the string `"always"` or as a field-condition object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub enum Condition {
    Always,
    Field(FieldCondition),
}

/// Comparators against a single resolved field; all specified ones must pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCondition {
    /// Dot path; a leading `@` resolves against the whole scope instead of the
    /// current step result.
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<Value>,
}

impl FieldCondition {
    /// Whether at least one comparator is set.
    pub fn has_comparator(&self) -> bool {
        self.exists.is_some()
            || self.equals.is_some()
            || self.not_equals.is_some()
            || self.includes.is_some()
    }
}

/// Wire form of [`Condition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCondition {
    Keyword(String),
    Field(FieldCondition),
}

const ALWAYS: &str = "always";

impl TryFrom<RawCondition> for Condition {
    type Error = String;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        match raw {
            RawCondition::Keyword(k) if k == ALWAYS => Ok(Condition::Always),
            RawCondition::Keyword(other) => Err(format!(
                "invalid condition '{other}' (expected \"always\" or a field condition)"
            )),
            RawCondition::Field(field) => Ok(Condition::Field(field)),
        }
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::Always => RawCondition::Keyword(ALWAYS.to_string()),
            Condition::Field(field) => RawCondition::Field(field),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
