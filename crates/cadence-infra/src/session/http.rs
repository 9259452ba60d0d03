//! HttpSessionBackend -- concrete [`SessionBackend`] over an opencode-style
//! REST API.
//!
//! Endpoints:
//! - `POST {base}/session/{id}/message` submits a prompt and returns the reply
//! - `GET {base}/session/{id}/message?limit=N` lists session history
//! - `GET {base}/session/status` reports busy/idle per session

use std::time::Duration;

use cadence_core::session::{SessionBackend, SessionError};
use cadence_types::config::BackendConfig;
use cadence_types::session::{
    MessagePart, PromptReply, PromptRequest, SessionMessage, SessionStatusMap,
};
use cadence_types::tool::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptBody<'a> {
    agent: &'a str,
    parts: &'a [MessagePart],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    tool_loop: bool,
}

#[derive(Debug, Default, Deserialize)]
struct PromptResponse {
    #[serde(default)]
    info: Option<ResponseInfo>,
    #[serde(default)]
    parts: Vec<MessagePart>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseInfo {
    #[serde(default)]
    error: Option<Value>,
}

impl From<PromptResponse> for PromptReply {
    fn from(response: PromptResponse) -> Self {
        let error = response
            .error
            .or_else(|| response.info.and_then(|info| info.error))
            .filter(|e| !e.is_null())
            .map(|e| error_message(&e));
        PromptReply {
            error,
            parts: response.parts,
        }
    }
}

/// Human-readable message from a backend error payload.
fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("data")
            .and_then(|d| d.get("message"))
            .or_else(|| map.get("message"))
            .or_else(|| map.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

/// Split `provider/model` into the backend's model reference.
fn model_ref(model: &str) -> Value {
    match model.split_once('/') {
        Some((provider, model)) => json!({ "providerID": provider, "modelID": model }),
        None => json!({ "modelID": model }),
    }
}

// ---------------------------------------------------------------------------
// HttpSessionBackend
// ---------------------------------------------------------------------------

/// Session backend speaking HTTP/JSON.
pub struct HttpSessionBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SessionError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SessionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for HttpSessionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSessionBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SessionBackend for HttpSessionBackend {
    async fn prompt(&self, request: &PromptRequest) -> Result<PromptReply, SessionError> {
        let body = PromptBody {
            agent: &request.agent,
            parts: &request.parts,
            model: request.model.as_deref().map(model_ref),
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
            tool_loop: request.tool_loop,
        };
        let url = self.url(&format!("/session/{}/message", request.session_id));

        tracing::debug!(session = %request.session_id, agent = %request.agent, "posting prompt");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::Request(format!("HTTP request failed: {e}")))?;

        let reply: PromptResponse = Self::read_json(response).await?;
        Ok(reply.into())
    }

    async fn messages(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<SessionMessage>, SessionError> {
        let url = self.url(&format!("/session/{session_id}/message"));
        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| SessionError::Request(format!("HTTP request failed: {e}")))?;

        Self::read_json(response).await
    }

    async fn status(&self) -> Result<SessionStatusMap, SessionError> {
        let response = self
            .client
            .get(self.url("/session/status"))
            .send()
            .await
            .map_err(|e| SessionError::Request(format!("HTTP request failed: {e}")))?;

        Self::read_json(response).await
    }
}
