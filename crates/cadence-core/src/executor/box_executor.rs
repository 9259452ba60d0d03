//! BoxPromptExecutor -- object-safe dynamic dispatch wrapper for PromptExecutor.
//!
//! Same blanket-impl pattern as the other boxed ports:
//! 1. Define an object-safe `PromptExecutorDyn` trait with boxed futures
//! 2. Blanket-impl `PromptExecutorDyn` for all `T: PromptExecutor`
//! 3. `BoxPromptExecutor` wraps `Box<dyn PromptExecutorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use super::prompt_executor::{ExecutorError, PromptExecutor};

/// Object-safe version of [`PromptExecutor`] with boxed futures.
///
/// Arguments are owned so the boxed future borrows only the executor.
pub trait PromptExecutorDyn: Send + Sync {
    fn execute_boxed(
        &self,
        agent: String,
        prompt: String,
    ) -> Pin<Box<dyn Future<Output = Result<String, ExecutorError>> + Send + '_>>;
}

impl<T: PromptExecutor> PromptExecutorDyn for T {
    fn execute_boxed(
        &self,
        agent: String,
        prompt: String,
    ) -> Pin<Box<dyn Future<Output = Result<String, ExecutorError>> + Send + '_>> {
        Box::pin(async move { self.execute(&agent, &prompt).await })
    }
}

/// Type-erased prompt executor.
///
/// `PromptExecutor` uses RPITIT and cannot be a trait object directly;
/// `BoxPromptExecutor` itself implements the trait, so the engine stays
/// generic while the CLI picks polling or tool-calling at runtime.
pub struct BoxPromptExecutor {
    inner: Box<dyn PromptExecutorDyn + Send + Sync>,
}

impl BoxPromptExecutor {
    pub fn new<T: PromptExecutor + 'static>(executor: T) -> Self {
        Self {
            inner: Box::new(executor),
        }
    }
}

impl std::fmt::Debug for BoxPromptExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxPromptExecutor").finish_non_exhaustive()
    }
}

impl PromptExecutor for BoxPromptExecutor {
    fn execute(
        &self,
        agent: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<String, ExecutorError>> + Send {
        self.inner
            .execute_boxed(agent.to_string(), prompt.to_string())
    }
}
