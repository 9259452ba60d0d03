//! Template scope: the mutable state of a single workflow run.
//!
//! The scope is the only mutable entity in a run. It is serialized whole to
//! the state file after every crash-relevant mutation and deserialized on
//! resume. Only the top-level fields are typed; user inputs and parsed step
//! outputs are opaque JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sentinel state key marking the bootstrap phase as done.
pub const BOOTSTRAP_COMPLETE: &str = "_bootstrapComplete";

/// Sentinel state key marking the final phase as done.
pub const FINAL_COMPLETE: &str = "_finalComplete";

/// Value stored under the sentinel keys.
pub const FLAG_TRUE: &str = "true";

// ---------------------------------------------------------------------------
// TemplateScope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateScope {
    /// Caller inputs merged over configured defaults.
    #[serde(default)]
    pub user: Map<String, Value>,
    pub run: RunInfo,
    /// Named state variables (rendered strings).
    #[serde(default)]
    pub state: BTreeMap<String, String>,
    /// Results of the current round only.
    #[serde(default)]
    pub steps: BTreeMap<String, StepResult>,
    #[serde(default)]
    pub round: u32,
    pub max_rounds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BTreeMap<String, StepResult>>,
    #[serde(default, rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_results: Option<BTreeMap<String, StepResult>>,
    /// Most recently executed step result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<StepResult>,
    /// Step about to run (or running) in the current round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_key: Option<String>,
    #[serde(default)]
    pub rounds_log: Vec<RoundLog>,
    /// Outcome produced by the round loop, recorded once it ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RecordedOutcome>,
}

impl TemplateScope {
    /// Whether a sentinel flag such as [`BOOTSTRAP_COMPLETE`] is set.
    pub fn flag(&self, key: &str) -> bool {
        self.state.get(key).is_some_and(|v| v == FLAG_TRUE)
    }

    pub fn set_flag(&mut self, key: &str) {
        self.state.insert(key.to_string(), FLAG_TRUE.to_string());
    }

    /// Insert or overwrite the log entry for `round`.
    pub fn record_round(&mut self, round: u32) {
        let entry = RoundLog {
            round,
            steps: self.steps.clone(),
        };
        match self.rounds_log.iter_mut().find(|r| r.round == round) {
            Some(existing) => *existing = entry,
            None => self.rounds_log.push(entry),
        }
    }

    /// Whether `round` ran to completion (logged, nothing in flight).
    pub fn round_completed(&self, round: u32) -> bool {
        self.current_step_key.is_none() && self.rounds_log.iter().any(|r| r.round == round)
    }

    /// JSON view used for template and condition path lookups.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Identity of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub id: String,
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Output of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub key: String,
    pub role: String,
    /// Response text exactly as returned by the executor.
    pub raw: String,
    /// Extracted JSON, or `raw` as a string when extraction did not apply.
    pub parsed: Value,
    #[serde(rename = "type", default)]
    pub kind: StepKind,
}

impl StepResult {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    #[default]
    Agent,
}

/// Snapshot of one round's step results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundLog {
    pub round: u32,
    pub steps: BTreeMap<String, StepResult>,
}

/// Outcome as produced by a transition or the default, before reason rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedOutcome {
    pub outcome: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
