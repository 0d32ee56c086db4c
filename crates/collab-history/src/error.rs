//! Error types for the history service.

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history backend error: {0}")]
    Backend(String),
    #[error("failed to apply patch: {0}")]
    PatchApplyFailed(String),
    #[error("no history for session {session_id} at version {version}")]
    VersionNotFound { session_id: Uuid, version: u64 },
    #[error("session {0} has no recorded history")]
    NoHistory(Uuid),
    #[error("history queue is full, event dropped")]
    QueueFull,
}
