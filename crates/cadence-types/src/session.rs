//! Session backend wire types.
//!
//! Models the data shapes exchanged with an external stateful LLM session:
//! prompt submissions, ordered message history, and per-session status.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::ToolDefinition;

// ---------------------------------------------------------------------------
// Message parts
// ---------------------------------------------------------------------------

/// One part of a message exchanged with the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    /// The model asks for a tool to be executed.
    ToolCall {
        id: String,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    /// Result of a tool call, sent back to the model.
    ToolResult {
        tool_call_id: String,
        content: String,
    },
    /// Part types this crate does not interpret (reasoning, files, ...).
    #[serde(other)]
    Other,
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }
}

/// Concatenate the text parts of a message, newline separated.
pub fn join_text(parts: &[MessagePart]) -> String {
    parts
        .iter()
        .filter_map(|p| match p {
            MessagePart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Role of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTime {
    /// Creation time in epoch milliseconds.
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: String,
    pub role: MessageRole,
    pub time: MessageTime,
}

/// One entry of a session's ordered history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub info: MessageInfo,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl SessionMessage {
    pub fn text(&self) -> String {
        join_text(&self.parts)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Activity state of a session as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Busy,
    Retry,
}

/// Status keyed by session id.
pub type SessionStatusMap = HashMap<String, SessionStatus>;

// ---------------------------------------------------------------------------
// Prompt submission
// ---------------------------------------------------------------------------

/// A prompt submission to a session.
#[derive(Debug, Clone, Serialize)]
pub struct PromptRequest {
    pub session_id: String,
    pub parts: Vec<MessagePart>,
    pub agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Tools offered to the model for this turn.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Whether the backend may run its own tool loop. The tool-calling
    /// executor always sends `false` and executes tools itself.
    pub tool_loop: bool,
}

/// Backend reply to a prompt submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptReply {
    /// Backend-reported failure (session busy, provider error, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_part_tags() {
        let part: MessagePart = serde_json::from_value(json!({
            "type": "tool_call", "id": "c1", "name": "search", "arguments": { "q": "x" }
        }))
        .unwrap();
        assert_eq!(
            part,
            MessagePart::ToolCall {
                id: "c1".into(),
                name: "search".into(),
                arguments: json!({ "q": "x" }),
            }
        );

        let unknown: MessagePart =
            serde_json::from_value(json!({ "type": "reasoning", "text": "hmm" })).unwrap();
        assert_eq!(unknown, MessagePart::Other);
    }

    #[test]
    fn test_join_text_skips_non_text() {
        let parts = vec![
            MessagePart::text("a"),
            MessagePart::Other,
            MessagePart::text("b"),
        ];
        assert_eq!(join_text(&parts), "a\nb");
    }

    #[test]
    fn test_history_entry_deserialize() {
        let msg: SessionMessage = serde_json::from_value(json!({
            "info": { "id": "m1", "role": "assistant", "time": { "created": 5 } },
            "parts": [{ "type": "text", "text": "hi" }, { "type": "step-start" }]
        }))
        .unwrap();
        assert_eq!(msg.info.role, MessageRole::Assistant);
        assert_eq!(msg.text(), "hi");

        let other: MessageInfo = serde_json::from_value(json!({
            "id": "m2", "role": "system", "time": { "created": 1 }
        }))
        .unwrap();
        assert_eq!(other.role, MessageRole::Other);
    }

    #[test]
    fn test_status_map_deserialize() {
        let map: SessionStatusMap = serde_json::from_value(json!({
            "s1": { "type": "busy" },
            "s2": { "type": "idle" }
        }))
        .unwrap();
        assert_eq!(map["s1"], SessionStatus::Busy);
        assert_eq!(map["s2"], SessionStatus::Idle);
    }
}
