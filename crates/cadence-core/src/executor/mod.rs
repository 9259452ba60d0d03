//! Prompt executors: agent name + rendered prompt in, response text out.
//!
//! - `PromptExecutor`: RPITIT trait every strategy implements
//! - `BoxPromptExecutor`: object-safe wrapper for runtime strategy selection
//! - `ToolCallingExecutor`: bounded loop that runs tool calls locally
//! - `PollingExecutor`: submit to a stateful session, then poll for the reply

pub mod box_executor;
pub mod polling;
pub mod prompt_executor;
pub mod retry;
pub mod tool_calling;

pub use box_executor::BoxPromptExecutor;
pub use polling::PollingExecutor;
pub use prompt_executor::{ExecutorError, PromptExecutor};
pub use tool_calling::{MAX_STEPS, ToolCallingExecutor};
