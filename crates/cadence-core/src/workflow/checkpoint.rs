//! Durable checkpoints of the run scope.
//!
//! Wraps a `StateStore` with the scope's persistence rules: the whole scope is
//! written as one JSON document after every crash-relevant mutation, and a
//! missing or unreadable document means "start fresh" rather than "fail".

use std::path::Path;

use cadence_types::scope::TemplateScope;

use crate::repository::state::{StateError, StateStore};

// ---------------------------------------------------------------------------
// CheckpointManager
// ---------------------------------------------------------------------------

/// Persists and restores run scopes.
///
/// Generic over `S: StateStore` so it works with the JSON file store, the
/// in-memory store, or any other backend. All operations are no-ops when the
/// run has no state path.
pub struct CheckpointManager<S: StateStore> {
    store: S,
}

impl<S: StateStore> CheckpointManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load a previously persisted scope.
    ///
    /// Returns `Ok(None)` when there is no path, no document, or the document
    /// does not parse as a scope. Read failures other than "not found" are
    /// errors: silently starting over could replay finished work.
    pub async fn restore(
        &self,
        path: Option<&Path>,
    ) -> Result<Option<TemplateScope>, CheckpointError> {
        let Some(path) = path else {
            return Ok(None);
        };

        let Some(contents) = self.store.load(path).await? else {
            tracing::debug!(path = %path.display(), "no saved state, starting fresh");
            return Ok(None);
        };

        match serde_json::from_str::<TemplateScope>(&contents) {
            Ok(scope) => {
                tracing::info!(
                    path = %path.display(),
                    run_id = %scope.run.id,
                    round = scope.round,
                    "restored run state"
                );
                Ok(Some(scope))
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "saved state is unreadable, starting fresh"
                );
                Ok(None)
            }
        }
    }

    /// Write the scope in full.
    ///
    /// Failures are logged and swallowed; the run continues and the next
    /// successful write catches up.
    pub async fn persist(&self, path: Option<&Path>, scope: &TemplateScope) {
        let Some(path) = path else {
            return;
        };

        let contents = match serde_json::to_string_pretty(scope) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize run state");
                return;
            }
        };

        match self.store.save(path, &contents).await {
            Ok(()) => tracing::trace!(
                path = %path.display(),
                round = scope.round,
                step = scope.current_step_key.as_deref().unwrap_or(""),
                "checkpointed run state"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to persist run state, continuing"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// CheckpointError
// ---------------------------------------------------------------------------

/// Errors that can occur while restoring checkpoints.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying store operation failed.
    #[error("checkpoint store error: {0}")]
    Store(#[from] StateError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
