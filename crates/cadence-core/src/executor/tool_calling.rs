//! Tool-calling executor.
//!
//! Drives a bounded request/response loop against a session backend with the
//! backend's own tool loop switched off. Whenever the model asks for a tool,
//! the executor runs it through the injected [`ToolRegistry`] and sends the
//! result back as the next message. Text in a reply ends the loop.

use cadence_types::config::ToolLoopConfig;
use cadence_types::session::{MessagePart, PromptRequest, join_text};
use tracing::{debug, warn};

use super::prompt_executor::{ExecutorError, PromptExecutor};
use crate::session::SessionBackend;
use crate::tool::ToolRegistry;

/// Default backend round-trip budget per `execute` call.
pub const MAX_STEPS: u32 = 10;

/// Executor that resolves tool calls locally.
pub struct ToolCallingExecutor<B: SessionBackend, T: ToolRegistry> {
    backend: B,
    tools: T,
    session_id: String,
    model: Option<String>,
    max_steps: u32,
}

impl<B: SessionBackend, T: ToolRegistry> ToolCallingExecutor<B, T> {
    pub fn new(backend: B, tools: T, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            tools,
            session_id: session_id.into(),
            model: None,
            max_steps: MAX_STEPS,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_config(mut self, config: &ToolLoopConfig) -> Self {
        self.max_steps = config.max_steps;
        self
    }

    /// Run the first requested tool and describe its result for the model.
    async fn run_tool(&self, name: &str, arguments: serde_json::Value) -> String {
        match self.tools.execute_tool(name, arguments).await {
            Ok(value) => serde_json::to_string(&value).unwrap_or_else(|e| format!("Error: {e}")),
            Err(e) => {
                warn!(tool = %name, error = %e, "tool execution failed");
                format!("Error: {e}")
            }
        }
    }
}

impl<B: SessionBackend, T: ToolRegistry> PromptExecutor for ToolCallingExecutor<B, T> {
    async fn execute(&self, agent: &str, prompt: &str) -> Result<String, ExecutorError> {
        let tools = self.tools.definitions();
        let mut parts = vec![MessagePart::text(prompt)];

        for step in 1..=self.max_steps {
            let request = PromptRequest {
                session_id: self.session_id.clone(),
                parts: std::mem::take(&mut parts),
                agent: agent.to_string(),
                model: self.model.clone(),
                tools: tools.clone(),
                tool_loop: false,
            };
            let reply = self.backend.prompt(&request).await?;
            if let Some(error) = reply.error {
                return Err(ExecutorError::Backend(error));
            }

            let tool_call = reply.parts.iter().find_map(|part| match part {
                MessagePart::ToolCall {
                    id,
                    name,
                    arguments,
                } => Some((id.clone(), name.clone(), arguments.clone())),
                _ => None,
            });

            if let Some((id, name, arguments)) = tool_call {
                debug!(step, tool = %name, "running tool call");
                let content = self.run_tool(&name, arguments).await;
                parts = vec![MessagePart::ToolResult {
                    tool_call_id: id,
                    content,
                }];
                continue;
            }

            // Either the text answer or "" when the reply carried nothing usable.
            return Ok(join_text(&reply.parts));
        }

        Err(ExecutorError::MaxStepsExceeded {
            max_steps: self.max_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use cadence_types::session::{PromptReply, SessionMessage, SessionStatusMap};
    use cadence_types::tool::{ToolDefinition, ToolError};
    use serde_json::{Value, json};

    use crate::session::SessionError;
    use crate::tool::ToolSet;

    /// Backend that replays scripted replies and records every request.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<PromptReply>>,
        fallback: Option<PromptReply>,
        requests: Mutex<Vec<PromptRequest>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<PromptReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn always(reply: PromptReply) -> Self {
            Self {
                fallback: Some(reply),
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<PromptRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl SessionBackend for ScriptedBackend {
        async fn prompt(&self, request: &PromptRequest) -> Result<PromptReply, SessionError> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self.replies.lock().unwrap().pop_front();
            next.or_else(|| self.fallback.clone())
                .ok_or_else(|| SessionError::Request("script exhausted".to_string()))
        }

        async fn messages(
            &self,
            _session_id: &str,
            _limit: u32,
        ) -> Result<Vec<SessionMessage>, SessionError> {
            Ok(Vec::new())
        }

        async fn status(&self) -> Result<SessionStatusMap, SessionError> {
            Ok(SessionStatusMap::new())
        }
    }

    fn text_reply(text: &str) -> PromptReply {
        PromptReply {
            error: None,
            parts: vec![MessagePart::text(text)],
        }
    }

    fn tool_reply(id: &str, name: &str, arguments: Value) -> PromptReply {
        PromptReply {
            error: None,
            parts: vec![MessagePart::ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            }],
        }
    }

    fn tools() -> ToolSet {
        let mut tools = ToolSet::new();
        tools.register(
            ToolDefinition {
                name: "add".to_string(),
                description: "Add two numbers".to_string(),
                parameters: json!({ "type": "object" }),
            },
            |args| async move {
                let a = args["a"].as_i64().ok_or_else(|| ToolError::InvalidArguments {
                    tool: "add".to_string(),
                    message: "a must be an integer".to_string(),
                })?;
                let b = args["b"].as_i64().unwrap_or(0);
                Ok(json!({ "sum": a + b }))
            },
        );
        tools
    }

    #[tokio::test]
    async fn test_plain_text_reply() {
        let executor = ToolCallingExecutor::new(
            ScriptedBackend::new(vec![PromptReply {
                error: None,
                parts: vec![MessagePart::text("hello"), MessagePart::text("world")],
            }]),
            tools(),
            "ses-1",
        );

        assert_eq!(executor.execute("build", "hi").await.unwrap(), "hello\nworld");

        let requests = executor.backend.requests();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].tool_loop);
        assert_eq!(requests[0].agent, "build");
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].parts, vec![MessagePart::text("hi")]);
    }

    #[tokio::test]
    async fn test_tool_result_fed_back() {
        let executor = ToolCallingExecutor::new(
            ScriptedBackend::new(vec![
                tool_reply("call-1", "add", json!({ "a": 2, "b": 3 })),
                text_reply("the sum is 5"),
            ]),
            tools(),
            "ses-1",
        );

        assert_eq!(executor.execute("build", "add").await.unwrap(), "the sum is 5");

        let requests = executor.backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].parts,
            vec![MessagePart::ToolResult {
                tool_call_id: "call-1".to_string(),
                content: "{\"sum\":5}".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_tool_failure_becomes_error_string() {
        let executor = ToolCallingExecutor::new(
            ScriptedBackend::new(vec![
                tool_reply("c1", "missing", json!({})),
                tool_reply("c2", "add", json!({ "a": "x" })),
                text_reply("gave up"),
            ]),
            tools(),
            "ses-1",
        );

        assert_eq!(executor.execute("build", "go").await.unwrap(), "gave up");

        let requests = executor.backend.requests();
        let content = |i: usize| match &requests[i].parts[0] {
            MessagePart::ToolResult { content, .. } => content.clone(),
            other => panic!("unexpected part: {other:?}"),
        };
        assert!(content(1).starts_with("Error: "), "got: {}", content(1));
        assert!(content(1).contains("missing"));
        assert!(content(2).contains("a must be an integer"));
    }

    #[tokio::test]
    async fn test_only_first_tool_call_runs() {
        let mut reply = tool_reply("first", "add", json!({ "a": 1, "b": 1 }));
        reply.parts.push(MessagePart::ToolCall {
            id: "second".to_string(),
            name: "add".to_string(),
            arguments: json!({ "a": 9, "b": 9 }),
        });
        let executor = ToolCallingExecutor::new(
            ScriptedBackend::new(vec![reply, text_reply("ok")]),
            tools(),
            "ses-1",
        );

        executor.execute("build", "go").await.unwrap();
        let requests = executor.backend.requests();
        assert_eq!(requests[1].parts.len(), 1);
        assert!(matches!(
            &requests[1].parts[0],
            MessagePart::ToolResult { tool_call_id, .. } if tool_call_id == "first"
        ));
    }

    #[tokio::test]
    async fn test_empty_reply_is_empty_string() {
        let executor = ToolCallingExecutor::new(
            ScriptedBackend::new(vec![PromptReply {
                error: None,
                parts: vec![MessagePart::Other],
            }]),
            tools(),
            "ses-1",
        );
        assert_eq!(executor.execute("build", "go").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_stops_after_max_steps() {
        let executor = ToolCallingExecutor::new(
            ScriptedBackend::always(tool_reply("loop", "add", json!({ "a": 1 }))),
            tools(),
            "ses-1",
        );

        let err = executor.execute("build", "spin").await.unwrap_err();
        assert!(matches!(err, ExecutorError::MaxStepsExceeded { max_steps: 10 }));
        assert_eq!(err.to_string(), "Max steps exceeded");
        assert_eq!(executor.backend.requests().len(), MAX_STEPS as usize);
    }

    #[tokio::test]
    async fn test_backend_error_is_fatal() {
        let executor = ToolCallingExecutor::new(
            ScriptedBackend::new(vec![PromptReply {
                error: Some("provider down".to_string()),
                parts: vec![],
            }]),
            tools(),
            "ses-1",
        )
        .with_config(&ToolLoopConfig { max_steps: 3 });

        let err = executor.execute("build", "go").await.unwrap_err();
        assert!(matches!(err, ExecutorError::Backend(msg) if msg == "provider down"));
    }
}
