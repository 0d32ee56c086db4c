//! Append-only history for collaborative editing sessions (spec §4.7): a
//! pluggable key-value backend, the record types it stores, a single-span
//! patch engine for compacting snapshots, and the background service that
//! ties them together.

pub mod backend;
pub mod diff;
pub mod error;
pub mod records;
pub mod service;

pub use backend::{HistoryBackend, InMemoryBackend};
pub use diff::Patch;
pub use error::{HistoryError, Result};
pub use records::{HistoryRecord, OperationEvent, SnapshotBody, SnapshotEvent, SnapshotSummary};
pub use service::{HistoryListener, HistoryService, NullHistoryListener};
