//! JsonFileStateStore -- [`StateStore`] on the local filesystem.
//!
//! Each run's state is one JSON document at a caller-chosen path. Writes go
//! to a hidden sibling file first and are renamed over the target, so a crash
//! mid-write leaves either the previous document or the new one, never a
//! truncated mix.

use std::path::{Path, PathBuf};

use cadence_core::repository::state::{StateError, StateStore};

/// State store writing whole documents to disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileStateStore;

impl JsonFileStateStore {
    pub fn new() -> Self {
        Self
    }
}

/// Sibling path used for the in-progress write of `path`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

fn io_error(path: &Path, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl StateStore for JsonFileStateStore {
    async fn load(&self, path: &Path) -> Result<Option<String>, StateError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(path, err)),
        };

        match String::from_utf8(bytes) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "state file is not valid UTF-8, ignoring it"
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, path: &Path, contents: &str) -> Result<(), StateError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| io_error(&tmp, e))?;

        if let Err(err) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(path, err));
        }

        tracing::trace!(path = %path.display(), bytes = contents.len(), "wrote state file");
        Ok(())
    }
}
