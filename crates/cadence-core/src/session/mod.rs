//! Session backend port.
//!
//! A session backend is an external, stateful LLM conversation: prompts and
//! replies are ordered history entries, and the backend reports whether a
//! session is busy. Both prompt executors talk to the LLM through this trait;
//! the HTTP implementation lives in cadence-infra.

use cadence_types::session::{PromptReply, PromptRequest, SessionMessage, SessionStatusMap};

/// Errors from session backend calls.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session request failed: {0}")]
    Request(String),

    #[error("session backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode session response: {0}")]
    Decode(String),
}

/// Trait for session backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait SessionBackend: Send + Sync {
    /// Submit a prompt to a session.
    ///
    /// A backend-level rejection (e.g. the session is busy) is reported in
    /// [`PromptReply::error`]; transport failures are `Err`.
    fn prompt(
        &self,
        request: &PromptRequest,
    ) -> impl std::future::Future<Output = Result<PromptReply, SessionError>> + Send;

    /// Fetch up to `limit` history entries of a session, in any order.
    fn messages(
        &self,
        session_id: &str,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<SessionMessage>, SessionError>> + Send;

    /// Activity status of all known sessions.
    fn status(&self)
    -> impl std::future::Future<Output = Result<SessionStatusMap, SessionError>> + Send;
}
