//! Workflow engine: bootstrap, rounds, final.
//!
//! `WorkflowEngine` drives one run of a definition to an outcome. The run
//! scope is checkpointed after every mutation a crash must not lose, so
//! calling `run` again with the same state path resumes where the previous
//! attempt stopped: finished steps are never executed twice and the step that
//! was in flight runs again.

use std::collections::BTreeMap;
use std::path::Path;

use cadence_types::config::EngineConfig;
use cadence_types::scope::{
    BOOTSTRAP_COMPLETE, FINAL_COMPLETE, RecordedOutcome, RoundLog, RunInfo, StepResult,
    TemplateScope,
};
use cadence_types::workflow::{StepDefinition, WorkflowDefinition};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use super::checkpoint::{CheckpointError, CheckpointManager};
use super::definition::{WorkflowError, validate_definition};
use super::step_runner::StepRunner;
use super::template::{render, to_template_string};
use super::transition::resolve_transition;
use crate::executor::{ExecutorError, PromptExecutor};
use crate::repository::state::StateStore;

/// Outcome that triggers the final phase.
pub const DONE_OUTCOME: &str = "done";

/// Multiplier on the round's step count bounding step executions per round.
const CYCLE_FACTOR: usize = 3;

/// Input key that pins the run id.
const RUN_ID_INPUT: &str = "runId";

// ---------------------------------------------------------------------------
// RunResult
// ---------------------------------------------------------------------------

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: String,
    pub outcome: String,
    /// Reason template rendered against the final scope.
    pub reason: String,
    pub bootstrap: BTreeMap<String, StepResult>,
    pub rounds: Vec<RoundLog>,
    #[serde(rename = "final")]
    pub final_results: BTreeMap<String, StepResult>,
    /// State variables at the end of the run, sentinel flags included.
    pub state: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A jump named a step the round phase does not have.
    #[error("step '{0}' not found in round phase")]
    StepNotFound(String),

    /// A round executed more steps than its cycle ceiling allows.
    #[error("round {round} exceeded the limit of {limit} step executions")]
    CycleLimit { round: u32, limit: usize },

    /// Step execution failed.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// Saved state could not be read.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// The definition is invalid.
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

// ---------------------------------------------------------------------------
// Run-once phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum OncePhase {
    Bootstrap,
    Final,
}

impl OncePhase {
    fn name(self) -> &'static str {
        match self {
            OncePhase::Bootstrap => "bootstrap",
            OncePhase::Final => "final",
        }
    }

    fn flag(self) -> &'static str {
        match self {
            OncePhase::Bootstrap => BOOTSTRAP_COMPLETE,
            OncePhase::Final => FINAL_COMPLETE,
        }
    }

    fn results(self, scope: &mut TemplateScope) -> &mut Option<BTreeMap<String, StepResult>> {
        match self {
            OncePhase::Bootstrap => &mut scope.bootstrap,
            OncePhase::Final => &mut scope.final_results,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Runs workflow definitions with crash-safe checkpointing.
///
/// Generic over the prompt executor and the state store; use
/// [`BoxPromptExecutor`](crate::executor::BoxPromptExecutor) to pick the
/// executor at runtime.
pub struct WorkflowEngine<E: PromptExecutor, S: StateStore> {
    executor: E,
    checkpoints: CheckpointManager<S>,
    config: EngineConfig,
}

impl<E: PromptExecutor, S: StateStore> WorkflowEngine<E, S> {
    pub fn new(executor: E, store: S, config: EngineConfig) -> Self {
        Self {
            executor,
            checkpoints: CheckpointManager::new(store),
            config,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn store(&self) -> &S {
        self.checkpoints.store()
    }

    /// Run `definition` to an outcome.
    ///
    /// `inputs` become `user` in the scope (over the configured defaults).
    /// With a `state_path`, the scope is restored from and saved to that
    /// document; without one the run is not persisted.
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        inputs: Map<String, Value>,
        state_path: Option<&Path>,
    ) -> Result<RunResult, EngineError> {
        validate_definition(definition)?;

        let mut scope = self.init_scope(definition, inputs, state_path).await?;

        self.run_bootstrap(definition, &mut scope, state_path).await?;

        if scope.outcome.is_none() {
            self.run_rounds(definition, &mut scope, state_path).await?;
        }

        let recorded = match scope.outcome.clone() {
            Some(recorded) => recorded,
            None => {
                let default = &definition.flow.round.default_outcome;
                tracing::info!(
                    run_id = %scope.run.id,
                    outcome = %default.outcome,
                    "no outcome after max rounds, using default"
                );
                let recorded = RecordedOutcome {
                    outcome: default.outcome.clone(),
                    reason: default.reason.clone(),
                };
                scope.outcome = Some(recorded.clone());
                self.checkpoints.persist(state_path, &scope).await;
                recorded
            }
        };

        if recorded.outcome == DONE_OUTCOME {
            if let Some(phase) = &definition.flow.final_phase {
                self.run_once(definition, phase.steps(), OncePhase::Final, &mut scope, state_path)
                    .await?;
            }
        }

        let reason = render(&recorded.reason, &scope.to_value());
        tracing::info!(
            run_id = %scope.run.id,
            outcome = %recorded.outcome,
            rounds = scope.rounds_log.len(),
            "workflow run finished"
        );

        Ok(RunResult {
            run_id: scope.run.id.clone(),
            outcome: recorded.outcome,
            reason,
            bootstrap: scope.bootstrap.clone().unwrap_or_default(),
            rounds: scope.rounds_log.clone(),
            final_results: scope.final_results.clone().unwrap_or_default(),
            state: scope.state.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Scope lifecycle
    // -----------------------------------------------------------------------

    async fn init_scope(
        &self,
        definition: &WorkflowDefinition,
        inputs: Map<String, Value>,
        state_path: Option<&Path>,
    ) -> Result<TemplateScope, EngineError> {
        if let Some(scope) = self.checkpoints.restore(state_path).await? {
            return Ok(scope);
        }

        let run_id = inputs
            .get(RUN_ID_INPUT)
            .map(|v| to_template_string(Some(v)))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("req-{}", Utc::now().timestamp_millis()));

        let mut user = self.config.user_defaults.clone();
        user.extend(inputs);

        let mut scope = TemplateScope {
            user,
            run: RunInfo { id: run_id },
            max_rounds: definition
                .flow
                .round
                .max_rounds
                .unwrap_or(self.config.default_max_rounds),
            ..Default::default()
        };

        let nascent = scope.to_value();
        scope.state = definition
            .state
            .initial
            .iter()
            .map(|(name, template)| (name.clone(), render(template, &nascent)))
            .collect();

        tracing::info!(run_id = %scope.run.id, max_rounds = scope.max_rounds, "starting new run");
        self.checkpoints.persist(state_path, &scope).await;
        Ok(scope)
    }

    /// Render `updates` against the scope and merge them into `state`.
    fn apply_state_updates(updates: &BTreeMap<String, String>, scope: &mut TemplateScope) {
        if updates.is_empty() {
            return;
        }
        let view = scope.to_value();
        for (name, template) in updates {
            let value = render(template, &view);
            scope.state.insert(name.clone(), value);
        }
    }

    // -----------------------------------------------------------------------
    // Bootstrap and final
    // -----------------------------------------------------------------------

    async fn run_bootstrap(
        &self,
        definition: &WorkflowDefinition,
        scope: &mut TemplateScope,
        state_path: Option<&Path>,
    ) -> Result<(), EngineError> {
        let Some(phase) = &definition.flow.bootstrap else {
            return Ok(());
        };
        let steps = phase.steps();

        if scope.flag(BOOTSTRAP_COMPLETE) {
            // The round loop expects `current` to be the latest result.
            if scope.current.is_none() {
                scope.current = steps.last().and_then(|last| {
                    scope
                        .bootstrap
                        .as_ref()
                        .and_then(|results| results.get(&last.key))
                        .cloned()
                });
            }
            tracing::debug!(run_id = %scope.run.id, "bootstrap already complete");
            return Ok(());
        }

        self.run_once(definition, steps, OncePhase::Bootstrap, scope, state_path)
            .await
    }

    /// Run every step of a run-once phase in order, then set its flag.
    ///
    /// Partial results are not checkpointed: an interrupted phase starts
    /// over from its first step.
    async fn run_once(
        &self,
        definition: &WorkflowDefinition,
        steps: &[StepDefinition],
        phase: OncePhase,
        scope: &mut TemplateScope,
        state_path: Option<&Path>,
    ) -> Result<(), EngineError> {
        if scope.flag(phase.flag()) {
            return Ok(());
        }

        tracing::info!(run_id = %scope.run.id, phase = phase.name(), steps = steps.len(), "running phase");
        let runner = StepRunner::new(&self.executor, &self.config.default_agent);
        *phase.results(scope) = Some(BTreeMap::new());

        for step in steps {
            let result = runner.run(step, scope, definition).await?;
            phase
                .results(scope)
                .get_or_insert_with(BTreeMap::new)
                .insert(step.key.clone(), result.clone());
            scope.current = Some(result);
            Self::apply_state_updates(&step.state_updates, scope);
        }

        scope.set_flag(phase.flag());
        self.checkpoints.persist(state_path, scope).await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    async fn run_rounds(
        &self,
        definition: &WorkflowDefinition,
        scope: &mut TemplateScope,
        state_path: Option<&Path>,
    ) -> Result<(), EngineError> {
        let mut round = scope.round.max(1);
        if scope.round_completed(scope.round) {
            round = scope.round + 1;
        }

        while round <= scope.max_rounds {
            if scope.round != round {
                scope.steps.clear();
                scope.current_step_key = None;
            } else {
                tracing::info!(
                    run_id = %scope.run.id,
                    round,
                    step = scope.current_step_key.as_deref().unwrap_or(""),
                    "resuming round"
                );
            }
            scope.round = round;
            tracing::debug!(run_id = %scope.run.id, round, "starting round");

            let produced = self.run_round(definition, scope, state_path).await?;

            scope.record_round(round);
            scope.current_step_key = None;
            if let Some(outcome) = produced {
                tracing::info!(
                    run_id = %scope.run.id,
                    round,
                    outcome = %outcome.outcome,
                    "round produced an outcome"
                );
                scope.outcome = Some(outcome);
            }
            self.checkpoints.persist(state_path, scope).await;

            if scope.outcome.is_some() {
                break;
            }
            round += 1;
        }

        Ok(())
    }

    /// Execute one round's step graph.
    ///
    /// Each iteration checkpoints the in-flight step key together with every
    /// result produced so far, then executes that step.
    async fn run_round(
        &self,
        definition: &WorkflowDefinition,
        scope: &mut TemplateScope,
        state_path: Option<&Path>,
    ) -> Result<Option<RecordedOutcome>, EngineError> {
        let round_def = &definition.flow.round;
        let Some(first) = round_def.steps.first() else {
            return Ok(None);
        };

        let limit = round_def.steps.len() * CYCLE_FACTOR;
        let runner = StepRunner::new(&self.executor, &self.config.default_agent);
        let mut key = scope
            .current_step_key
            .clone()
            .unwrap_or_else(|| first.key.clone());
        let mut executed = 0;

        loop {
            if executed >= limit {
                return Err(EngineError::CycleLimit {
                    round: scope.round,
                    limit,
                });
            }
            let step = round_def
                .step(&key)
                .ok_or_else(|| EngineError::StepNotFound(key.clone()))?;

            scope.current_step_key = Some(key.clone());
            self.checkpoints.persist(state_path, scope).await;

            let result = runner.run(step, scope, definition).await?;
            executed += 1;
            let result_view = result.to_value();
            scope.steps.insert(key.clone(), result.clone());
            scope.current = Some(result);
            Self::apply_state_updates(&step.state_updates, scope);

            let scope_view = scope.to_value();
            let matched = resolve_transition(&step.transitions, &scope_view, &result_view)
                .or_else(|| resolve_transition(&step.exits, &scope_view, &result_view));

            let mut next = None;
            if let Some(transition) = matched {
                Self::apply_state_updates(&transition.state_updates, scope);
                if let Some(outcome) = &transition.outcome {
                    return Ok(Some(RecordedOutcome {
                        outcome: outcome.clone(),
                        reason: transition.reason.clone().unwrap_or_else(|| outcome.clone()),
                    }));
                }
                next = transition.next_step.clone();
            }

            let next = next
                .or_else(|| step.next.clone())
                .or_else(|| round_def.step_after(&key).map(str::to_string));
            match next {
                Some(next) => {
                    tracing::trace!(from = %key, to = %next, "advancing");
                    key = next;
                }
                None => return Ok(None),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
