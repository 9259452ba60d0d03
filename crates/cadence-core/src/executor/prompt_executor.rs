//! PromptExecutor trait definition.
//!
//! This is the capability the workflow engine drives: given an agent name and
//! a fully rendered prompt, produce the agent's response text. Strategies
//! differ in how they reach the LLM, not in what they return.

use crate::session::SessionError;

/// Errors from prompt execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The tool-calling loop used its whole round-trip budget.
    #[error("Max steps exceeded")]
    MaxStepsExceeded { max_steps: u32 },

    /// Every submission attempt was rejected or failed.
    #[error("Failed to send prompt after retries (Session likely busy)")]
    SendFailed { attempts: u32 },

    /// No reply arrived before the polling ceiling.
    #[error("timed out after {secs}s waiting for a reply")]
    Timeout { secs: u64 },

    /// The backend reported a failure for an accepted call.
    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Failure from a custom executor implementation.
    #[error("{0}")]
    Failed(String),
}

/// Trait for prompt execution strategies.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Wrap an
/// implementation in [`BoxPromptExecutor`](super::BoxPromptExecutor) when
/// the strategy is chosen at runtime.
pub trait PromptExecutor: Send + Sync {
    /// Run `prompt` against `agent` and return the response text.
    fn execute(
        &self,
        agent: &str,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, ExecutorError>> + Send;
}
