//! Workflow engine core: definitions, templating, transitions, and durable runs.
//!
//! This module contains the "brain" of the workflow engine:
//! - `definition` -- JSON/YAML parsing, validation, file loading
//! - `template` -- `{{dotted.path}}` rendering over the run scope
//! - `transition` -- first-match condition evaluation
//! - `step_runner` -- prompt assembly, executor call, JSON extraction
//! - `checkpoint` -- scope persistence for crash recovery
//! - `engine` -- bootstrap / round / final lifecycle

pub mod checkpoint;
pub mod definition;
pub mod engine;
pub mod step_runner;
pub mod template;
pub mod transition;

pub use engine::{EngineError, RunResult, WorkflowEngine};
