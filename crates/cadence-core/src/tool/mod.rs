//! Tool registry port and an in-memory implementation.
//!
//! The tool-calling executor receives its registry explicitly at construction
//! time; there is no process-wide registry.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use cadence_types::tool::{ToolDefinition, ToolError};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

/// Source of tools the model may call.
pub trait ToolRegistry: Send + Sync {
    /// Descriptions of every registered tool.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Run a tool with JSON arguments.
    fn execute_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> impl Future<Output = Result<Value, ToolError>> + Send;
}

type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// Registry of async closures keyed by tool name.
#[derive(Default, Clone)]
pub struct ToolSet {
    tools: BTreeMap<String, (ToolDefinition, ToolHandler)>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a tool.
    pub fn register<F, Fut>(&mut self, definition: ToolDefinition, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let handler: ToolHandler = Arc::new(move |args| handler(args).boxed());
        self.tools
            .insert(definition.name.clone(), (definition, handler));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry for ToolSet {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|(def, _)| def.clone()).collect()
    }

    fn execute_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> impl Future<Output = Result<Value, ToolError>> + Send {
        let handler = self.tools.get(name).map(|(_, h)| Arc::clone(h));
        let name = name.to_string();
        async move {
            match handler {
                Some(handler) => handler(arguments).await,
                None => Err(ToolError::NotFound(name)),
            }
        }
    }
}
