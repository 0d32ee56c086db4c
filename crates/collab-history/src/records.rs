//! History events (what a session reports) and history records (what the
//! backend persists) — spec §3 "History record" and §4.7.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// SHA-256 hex digest of `content`, stamped onto every stored snapshot so a
/// reconstruction can be checked for corruption without re-fetching the
/// original.
#[must_use]
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Reported by a session every time it accepts an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEvent {
    pub session_id: Uuid,
    pub revision: u64,
    /// Wire-encoded (`ot_core::codec`) operation body.
    pub op: Value,
    pub author: String,
    pub timestamp: i64,
}

/// Reported by a session whenever it cuts a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEvent {
    pub session_id: Uuid,
    pub revision: u64,
    /// The snapshot's full text. The service itself decides whether to
    /// persist this verbatim or turn it into a patch against the previous
    /// snapshot, depending on whether patch mode is enabled — the session
    /// always reports full content, it never computes patches itself.
    pub content: String,
    /// The operation tail being cleared by this cut, carried along so a
    /// consumer interested in per-op granularity doesn't lose it.
    pub op_tail: Vec<Value>,
    pub author: String,
    pub timestamp: i64,
}

/// One append-only stored record (spec §3 "History record").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum HistoryRecord {
    Operation {
        revision: u64,
        op: Value,
        author: String,
        timestamp: i64,
    },
    Snapshot {
        revision: u64,
        body: SnapshotBody,
        /// SHA-256 hex digest of the snapshot's full content, checked after
        /// reconstructing a patch-mode snapshot as a cheap corruption check.
        fingerprint: String,
        op_tail: Vec<Value>,
        author: String,
        timestamp: i64,
    },
}

impl HistoryRecord {
    #[must_use]
    pub fn revision(&self) -> u64 {
        match self {
            HistoryRecord::Operation { revision, .. } => *revision,
            HistoryRecord::Snapshot { revision, .. } => *revision,
        }
    }
}

/// A stored snapshot's body: either full text, or (in patch mode, for every
/// snapshot after the first) a patch against the immediately preceding
/// snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value")]
pub enum SnapshotBody {
    Full(String),
    Patch(String),
}

/// Metadata summary of a stored snapshot, for [`crate::HistoryService::list_snapshots`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub revision: u64,
    pub timestamp: i64,
    pub op_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic_and_content_sensitive() {
        let a = fingerprint("Hello World");
        let b = fingerprint("Hello World");
        let c = fingerprint("Hello World!");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
