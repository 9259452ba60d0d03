//! Polling executor.
//!
//! Talks to a long-lived, stateful session: the prompt is submitted once and
//! the reply is picked up by polling the session history. Before submitting,
//! the history is checked for the same prompt so that a resumed run does not
//! ask the same question twice.

use std::time::Duration;

use cadence_types::config::PollingConfig;
use cadence_types::session::{
    MessagePart, MessageRole, PromptRequest, SessionMessage, SessionStatus,
};
use tracing::{debug, info, warn};

use super::prompt_executor::{ExecutorError, PromptExecutor};
use super::retry::RetryPolicy;
use crate::session::SessionBackend;

/// What the history says about a prompt before it is sent.
#[derive(Debug, PartialEq)]
enum Dedup<'a> {
    /// Already answered: return this text without resubmitting.
    Answered(String),
    /// Already submitted: wait for a reply after this message.
    InFlight(&'a SessionMessage),
    /// Not seen: submit, then wait for a reply after the current last message.
    Fresh,
}

/// Inspect sorted history for an earlier submission of `prompt`.
fn dedup<'a>(history: &'a [SessionMessage], prompt: &str) -> Dedup<'a> {
    let Some(last) = history.last() else {
        return Dedup::Fresh;
    };

    match last.info.role {
        MessageRole::User if last.text() == prompt => Dedup::InFlight(last),
        MessageRole::Assistant => {
            let asked = history
                .iter()
                .rev()
                .skip(1)
                .find(|m| m.info.role == MessageRole::User);
            match asked {
                Some(user) if user.text() == prompt => {
                    let text = last.text();
                    if text.trim().is_empty() {
                        Dedup::InFlight(user)
                    } else {
                        Dedup::Answered(text)
                    }
                }
                _ => Dedup::Fresh,
            }
        }
        _ => Dedup::Fresh,
    }
}

/// First assistant reply with text that is newer than `after`.
fn find_reply(history: &[SessionMessage], after: Option<(&str, i64)>) -> Option<String> {
    let newer: &[SessionMessage] = match after {
        None => history,
        Some((id, created)) => match history.iter().position(|m| m.info.id == id) {
            Some(idx) => &history[idx + 1..],
            // The anchor fell out of the fetched window; fall back to timestamps.
            None => {
                let start = history.partition_point(|m| m.info.time.created <= created);
                &history[start..]
            }
        },
    };

    newer
        .iter()
        .filter(|m| m.info.role == MessageRole::Assistant)
        .map(SessionMessage::text)
        .find(|text| !text.trim().is_empty())
}

/// Executor for a stateful session that is observed by polling.
pub struct PollingExecutor<B: SessionBackend> {
    backend: B,
    session_id: String,
    model: Option<String>,
    config: PollingConfig,
    retry: RetryPolicy,
}

impl<B: SessionBackend> PollingExecutor<B> {
    pub fn new(backend: B, session_id: impl Into<String>) -> Self {
        Self::with_config(backend, session_id, PollingConfig::default())
    }

    pub fn with_config(backend: B, session_id: impl Into<String>, config: PollingConfig) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
            model: None,
            retry: RetryPolicy::from_config(&config),
            config,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Session history ordered by creation time.
    async fn history(&self) -> Result<Vec<SessionMessage>, ExecutorError> {
        let mut messages = self
            .backend
            .messages(&self.session_id, self.config.history_limit)
            .await?;
        messages.sort_by_key(|m| m.info.time.created);
        Ok(messages)
    }

    async fn submit(&self, agent: &str, prompt: &str) -> Result<(), ExecutorError> {
        let request = PromptRequest {
            session_id: self.session_id.clone(),
            parts: vec![MessagePart::text(prompt)],
            agent: agent.to_string(),
            model: self.model.clone(),
            tools: Vec::new(),
            tool_loop: true,
        };

        let mut attempt = 1;
        loop {
            match self.backend.prompt(&request).await {
                Ok(reply) => match reply.error {
                    None => {
                        debug!(session = %self.session_id, attempt, "prompt submitted");
                        return Ok(());
                    }
                    Some(error) => {
                        warn!(session = %self.session_id, attempt, %error, "prompt rejected");
                    }
                },
                Err(e) => {
                    warn!(session = %self.session_id, attempt, error = %e, "prompt submission failed");
                }
            }

            if !self.retry.should_retry(attempt) {
                return Err(ExecutorError::SendFailed { attempts: attempt });
            }
            tokio::time::sleep(self.retry.backoff).await;
            attempt += 1;
        }
    }

    async fn wait_for_reply(&self, after: Option<(&str, i64)>) -> Result<String, ExecutorError> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut seen_busy = false;

        let poll = async {
            loop {
                match self.backend.status().await {
                    Ok(statuses) => {
                        if statuses.get(&self.session_id) == Some(&SessionStatus::Busy) {
                            seen_busy = true;
                        }
                    }
                    Err(e) => debug!(error = %e, "status check failed"),
                }

                match self.history().await {
                    Ok(history) => {
                        if let Some(reply) = find_reply(&history, after) {
                            return reply;
                        }
                    }
                    Err(e) => warn!(session = %self.session_id, error = %e, "history fetch failed"),
                }

                tokio::time::sleep(interval).await;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let result = tokio::time::timeout(timeout, poll).await;
        match result {
            Ok(reply) => Ok(reply),
            Err(_) => {
                warn!(session = %self.session_id, seen_busy, "gave up waiting for a reply");
                Err(ExecutorError::Timeout {
                    secs: self.config.timeout_secs,
                })
            }
        }
    }
}

impl<B: SessionBackend> PromptExecutor for PollingExecutor<B> {
    async fn execute(&self, agent: &str, prompt: &str) -> Result<String, ExecutorError> {
        let history = self.history().await?;

        let anchor = match dedup(&history, prompt) {
            Dedup::Answered(text) => {
                info!(session = %self.session_id, "prompt already answered, reusing reply");
                return Ok(text);
            }
            Dedup::InFlight(message) => {
                info!(session = %self.session_id, "prompt already in flight, waiting");
                Some(message)
            }
            Dedup::Fresh => {
                let last = history.last();
                self.submit(agent, prompt).await?;
                last
            }
        };

        self.wait_for_reply(anchor.map(|m| (m.info.id.as_str(), m.info.time.created)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cadence_types::session::{
        MessageInfo, MessageTime, PromptReply, SessionStatusMap,
    };

    use crate::session::SessionError;

    fn message(id: &str, role: MessageRole, created: i64, text: &str) -> SessionMessage {
        SessionMessage {
            info: MessageInfo {
                id: id.to_string(),
                role,
                time: MessageTime { created },
            },
            parts: vec![MessagePart::text(text)],
        }
    }

    fn user(id: &str, created: i64, text: &str) -> SessionMessage {
        message(id, MessageRole::User, created, text)
    }

    fn assistant(id: &str, created: i64, text: &str) -> SessionMessage {
        message(id, MessageRole::Assistant, created, text)
    }

    /// Session whose history advances one snapshot per `messages` call and
    /// whose prompt submissions follow a script.
    #[derive(Default)]
    struct FakeSession {
        snapshots: Mutex<VecDeque<Vec<SessionMessage>>>,
        current: Mutex<Vec<SessionMessage>>,
        prompt_results: Mutex<VecDeque<Result<PromptReply, SessionError>>>,
        prompts: AtomicUsize,
        history_calls: AtomicUsize,
    }

    impl FakeSession {
        fn new(snapshots: Vec<Vec<SessionMessage>>) -> Self {
            Self {
                snapshots: Mutex::new(snapshots.into()),
                ..Default::default()
            }
        }

        fn with_prompt_results(self, results: Vec<Result<PromptReply, SessionError>>) -> Self {
            *self.prompt_results.lock().unwrap() = results.into();
            self
        }

        fn prompts(&self) -> usize {
            self.prompts.load(Ordering::SeqCst)
        }
    }

    impl SessionBackend for FakeSession {
        async fn prompt(&self, _request: &PromptRequest) -> Result<PromptReply, SessionError> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.prompt_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(PromptReply::default()))
        }

        async fn messages(
            &self,
            _session_id: &str,
            _limit: u32,
        ) -> Result<Vec<SessionMessage>, SessionError> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            let mut current = self.current.lock().unwrap();
            if let Some(next) = self.snapshots.lock().unwrap().pop_front() {
                *current = next;
            }
            // Hand back in reverse to exercise sorting.
            Ok(current.iter().rev().cloned().collect())
        }

        async fn status(&self) -> Result<SessionStatusMap, SessionError> {
            Ok(SessionStatusMap::from([(
                "ses-1".to_string(),
                SessionStatus::Busy,
            )]))
        }
    }

    fn test_config() -> PollingConfig {
        PollingConfig {
            max_send_attempts: 5,
            retry_backoff_ms: 2_000,
            poll_interval_ms: 500,
            timeout_secs: 300,
            history_limit: 100,
        }
    }

    // -----------------------------------------------------------------------
    // dedup
    // -----------------------------------------------------------------------

    #[test]
    fn test_dedup_answered() {
        let history = vec![
            user("u1", 1, "first"),
            assistant("a1", 2, "one"),
            user("u2", 3, "second"),
            assistant("a2", 4, "two"),
        ];
        assert_eq!(dedup(&history, "second"), Dedup::Answered("two".to_string()));
        assert_eq!(dedup(&history, "first"), Dedup::Fresh);
    }

    #[test]
    fn test_dedup_in_flight() {
        let history = vec![assistant("a1", 1, "hello"), user("u1", 2, "do it")];
        assert_eq!(dedup(&history, "do it"), Dedup::InFlight(&history[1]));
        assert_eq!(dedup(&history, "other"), Dedup::Fresh);
        assert_eq!(dedup(&[], "anything"), Dedup::Fresh);
    }

    #[test]
    fn test_dedup_empty_reply_still_pending() {
        let history = vec![user("u1", 1, "do it"), assistant("a1", 2, "")];
        assert_eq!(dedup(&history, "do it"), Dedup::InFlight(&history[0]));
    }

    #[test]
    fn test_find_reply_after_anchor() {
        let history = vec![
            user("u1", 1, "q"),
            assistant("a1", 2, "old"),
            user("u2", 3, "q2"),
            assistant("a2", 4, "  "),
            assistant("a3", 5, "new"),
        ];
        assert_eq!(find_reply(&history, Some(("u2", 3))).as_deref(), Some("new"));
        assert_eq!(find_reply(&history, None).as_deref(), Some("old"));
        assert_eq!(find_reply(&history, Some(("a3", 5))), None);
        // Anchor not in window: only messages created after it count.
        assert_eq!(find_reply(&history, Some(("gone", 4))).as_deref(), Some("new"));
    }

    // -----------------------------------------------------------------------
    // execute
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_answered_prompt_is_not_resubmitted() {
        let session = FakeSession::new(vec![vec![
            user("u1", 1, "review it"),
            assistant("a1", 2, "{\"verdict\":\"approve\"}"),
        ]]);
        let executor = PollingExecutor::with_config(session, "ses-1", test_config());

        let reply = executor.execute("build", "review it").await.unwrap();
        assert_eq!(reply, "{\"verdict\":\"approve\"}");
        assert_eq!(executor.backend.prompts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_prompt_submits_then_polls() {
        let before = vec![user("u0", 1, "earlier"), assistant("a0", 2, "earlier reply")];
        let mut pending = before.clone();
        pending.push(user("u1", 3, "new task"));
        let mut done = pending.clone();
        done.push(assistant("a1", 4, "finished"));

        let session = FakeSession::new(vec![before, pending.clone(), pending, done]);
        let executor = PollingExecutor::with_config(session, "ses-1", test_config());

        let reply = executor.execute("build", "new task").await.unwrap();
        assert_eq!(reply, "finished");
        assert_eq!(executor.backend.prompts(), 1);
        assert_eq!(executor.backend.history_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_prompt_waits_without_submitting() {
        let pending = vec![user("u1", 1, "task")];
        let mut done = pending.clone();
        done.push(assistant("a1", 2, "result"));

        let session = FakeSession::new(vec![pending, done]);
        let executor = PollingExecutor::with_config(session, "ses-1", test_config());

        assert_eq!(executor.execute("build", "task").await.unwrap(), "result");
        assert_eq!(executor.backend.prompts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_retries_then_succeeds() {
        let session = FakeSession::new(vec![
            vec![],
            vec![user("u1", 1, "task"), assistant("a1", 2, "ok")],
        ])
        .with_prompt_results(vec![
            Ok(PromptReply {
                error: Some("session busy".to_string()),
                parts: vec![],
            }),
            Err(SessionError::Request("connection reset".to_string())),
            Ok(PromptReply::default()),
        ]);
        let executor = PollingExecutor::with_config(session, "ses-1", test_config());

        let started = tokio::time::Instant::now();
        assert_eq!(executor.execute("build", "task").await.unwrap(), "ok");
        assert_eq!(executor.backend.prompts(), 3);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_gives_up_after_max_attempts() {
        let busy = || {
            Ok(PromptReply {
                error: Some("busy".to_string()),
                parts: vec![],
            })
        };
        let session = FakeSession::new(vec![vec![]])
            .with_prompt_results((0..10).map(|_| busy()).collect());
        let executor = PollingExecutor::with_config(session, "ses-1", test_config());

        let err = executor.execute("build", "task").await.unwrap_err();
        assert!(matches!(err, ExecutorError::SendFailed { attempts: 5 }));
        assert_eq!(
            err.to_string(),
            "Failed to send prompt after retries (Session likely busy)"
        );
        assert_eq!(executor.backend.prompts(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_reply() {
        let session = FakeSession::new(vec![vec![user("u1", 1, "task")]]);
        let mut config = test_config();
        config.timeout_secs = 5;
        let executor = PollingExecutor::with_config(session, "ses-1", config);

        let err = executor.execute("build", "task").await.unwrap_err();
        assert!(matches!(err, ExecutorError::Timeout { secs: 5 }));
    }
}
