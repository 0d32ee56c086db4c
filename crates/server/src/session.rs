//! Edit session (C4): one per open document. Owns the snapshot, the tail of
//! operations since the last cut, per-client membership, and the
//! snapshot-cut policy. Concurrent access is serialized by the session's own
//! lock (spec §5(b)).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use collab_common::ids::unix_now;
use collab_history::{HistoryListener, OperationEvent, SnapshotEvent};
use collab_proto::outbound::{
    RemoteOperationData, SessionInfoData, UserJoinedData, UserLeftData,
};
use collab_proto::OutboundMessage;
use ot_core::{apply, transform, Operation};
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Capacity of each session's broadcast channel. A connection that falls this
/// far behind the others (`RecvError::Lagged`) simply drops the gap and
/// resubscribes — an operational hiccup, not a protocol error, since the
/// client still has `recent_ops`/a later `subscribe` to catch back up.
const BROADCAST_CAPACITY: usize = 256;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Per-client membership record.
///
/// `subscribed` tracks whether the client holds an independent reader-band
/// slot acquired through `subscribe`; `editing` tracks whether it currently
/// occupies the writer band. A client that only ever called `start_editing`
/// (never `subscribe`) has `subscribed == false`: on `stop_editing` it has no
/// reader slot to fall back to and is removed outright rather than demoted.
#[derive(Debug, Clone)]
struct ClientState {
    read_only: bool,
    subscribed: bool,
    editing: bool,
    cursor: Option<(usize, usize)>,
    last_seen: i64,
}

/// Counters exposed for monitoring (spec §4.4 `snapshot_info`).
#[derive(Debug, Clone, Copy)]
pub struct SnapshotInfo {
    pub session_id: Uuid,
    pub revision: u64,
    pub readers: u32,
    pub writers: u32,
}

struct EditSessionState {
    snapshot_content: String,
    snapshot_version: u64,
    current_version: u64,
    recent_ops: Vec<Operation>,
    clients: HashMap<String, ClientState>,
    last_snapshot_time: i64,
}

impl EditSessionState {
    fn utf16_len(&self) -> usize {
        ot_core::utf16::len_utf16(&self.snapshot_content_at_tail())
    }

    /// `snapshot_content` with `recent_ops` already folded in — the
    /// session's actual current content (invariant 1/2, spec §3).
    fn snapshot_content_at_tail(&self) -> String {
        let mut content = self.snapshot_content.clone();
        for op in &self.recent_ops {
            content = apply(&content, op).expect("recent_ops invariant violated");
        }
        content
    }

    fn ref_count(&self) -> (u32, u32) {
        let mut readers = 0;
        let mut writers = 0;
        for client in self.clients.values() {
            if client.editing {
                writers += 1;
            } else if client.subscribed {
                readers += 1;
            }
        }
        (readers, writers)
    }
}

/// One open document. Identified by a freshly minted UUID (spec §3 "Edit
/// session").
pub struct EditSession {
    pub session_id: Uuid,
    pub file_path: String,
    history: Arc<dyn HistoryListener>,
    thresholds: ServerConfig,
    state: Mutex<EditSessionState>,
    broadcast_tx: broadcast::Sender<OutboundMessage>,
    /// Set by [`Self::mark_shutting_down`] during the server's two-phase
    /// shutdown drain (spec §5). Once set, [`Self::apply_operation`] rejects
    /// new ops instead of applying them.
    shutting_down: AtomicBool,
}

/// What the caller must do after an accepted operation: apply `op` as this
/// client's own ack, and broadcast it to every other connected client.
pub struct AppliedOperation {
    pub new_revision: u64,
    pub op_to_broadcast: Operation,
}

impl EditSession {
    #[must_use]
    pub fn new(
        session_id: Uuid,
        file_path: String,
        initial_content: String,
        history: Arc<dyn HistoryListener>,
        thresholds: ServerConfig,
    ) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            session_id,
            file_path,
            history,
            thresholds,
            state: Mutex::new(EditSessionState {
                snapshot_content: initial_content,
                snapshot_version: 0,
                current_version: 0,
                recent_ops: Vec::new(),
                clients: HashMap::new(),
                last_snapshot_time: unix_now(),
            }),
            broadcast_tx,
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Broadcast the current membership counters (spec §4.4/§4.6
    /// `session_info`), emitted alongside every `user_joined`/`user_left`.
    fn broadcast_session_info(&self, revision: u64, readers: u32, writers: u32) {
        self.broadcast_tx
            .send(OutboundMessage::SessionInfo(SessionInfoData {
                session_id: self.session_id,
                revision,
                readers,
                writers,
            }))
            .ok();
    }

    /// Flip the shutdown flag so [`Self::apply_operation`] starts rejecting
    /// new ops. Called by the broker once per session during the server's
    /// shutdown drain.
    pub fn mark_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    /// §5 "Cancellation & timeouts": drop every client whose `last_seen` is
    /// at least `idle_timeout_seconds` old. Returns `true` if the session's
    /// ref-count has fallen to `(0, 0)` and the caller should destroy it.
    pub async fn evict_idle_clients(&self, idle_timeout_seconds: u64) -> bool {
        let mut state = self.state.lock().await;
        let now = unix_now();
        let idle: Vec<String> = state
            .clients
            .iter()
            .filter(|(_, c)| now.saturating_sub(c.last_seen) >= idle_timeout_seconds as i64)
            .map(|(id, _)| id.clone())
            .collect();
        if idle.is_empty() {
            return state.ref_count() == (0, 0);
        }
        for client_id in &idle {
            state.clients.remove(client_id);
        }
        let (readers, writers) = state.ref_count();
        let revision = state.current_version;
        let empty = (readers, writers) == (0, 0);
        drop(state);

        for client_id in idle {
            warn!(session_id = %self.session_id, client_id, "evicting idle client");
            self.broadcast_tx
                .send(OutboundMessage::UserLeft(UserLeftData {
                    session_id: self.session_id,
                    client_id,
                }))
                .ok();
        }
        if !empty {
            self.broadcast_session_info(revision, readers, writers);
        }
        empty
    }

    /// Subscribe to this session's broadcast stream of `remote_operation` /
    /// `user_joined` / `user_left` notifications. A fresh receiver only sees
    /// messages sent after it was created, so the caller must already hold
    /// the snapshot/tail from `subscribe`/`start_editing` before relying on
    /// it to catch up.
    #[must_use]
    pub fn subscribe_broadcast(&self) -> broadcast::Receiver<OutboundMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Attach a client; returns the current snapshot content, revision, and
    /// tail to seed the client's local state.
    pub async fn subscribe(&self, client_id: &str, read_only: bool) -> (String, u64, Vec<Operation>) {
        let mut state = self.state.lock().await;
        let content = state.snapshot_content_at_tail();
        let revision = state.current_version;
        let tail = state.recent_ops.clone();
        state
            .clients
            .entry(client_id.to_string())
            .and_modify(|c| {
                c.subscribed = true;
                c.read_only = read_only;
            })
            .or_insert(ClientState {
                read_only,
                subscribed: true,
                editing: false,
                cursor: None,
                last_seen: unix_now(),
            });
        let (readers, writers) = state.ref_count();
        drop(state);
        self.broadcast_tx
            .send(OutboundMessage::UserJoined(UserJoinedData {
                session_id: self.session_id,
                client_id: client_id.to_string(),
                read_only,
            }))
            .ok();
        self.broadcast_session_info(revision, readers, writers);
        (content, revision, tail)
    }

    /// Detach a client. Returns `true` if the session's ref-count has fallen
    /// to `(0, 0)` and the caller (the broker) should destroy it.
    pub async fn unsubscribe(&self, client_id: &str) -> bool {
        let mut state = self.state.lock().await;
        state.clients.remove(client_id);
        let (readers, writers) = state.ref_count();
        let revision = state.current_version;
        let empty = (readers, writers) == (0, 0);
        drop(state);
        self.broadcast_tx
            .send(OutboundMessage::UserLeft(UserLeftData {
                session_id: self.session_id,
                client_id: client_id.to_string(),
            }))
            .ok();
        if !empty {
            self.broadcast_session_info(revision, readers, writers);
        }
        empty
    }

    /// Move `client_id` into the writer band, creating a write-only
    /// membership if it was not already subscribed.
    pub async fn start_editing(&self, client_id: &str) -> Result<(String, u64, Vec<Operation>)> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.clients.get(client_id) {
            if existing.read_only {
                return Err(ServerError::PermissionDenied("session is read-only for this client"));
            }
        }
        state
            .clients
            .entry(client_id.to_string())
            .and_modify(|c| c.editing = true)
            .or_insert(ClientState {
                read_only: false,
                subscribed: false,
                editing: true,
                cursor: None,
                last_seen: unix_now(),
            });
        let content = state.snapshot_content_at_tail();
        let revision = state.current_version;
        let tail = state.recent_ops.clone();
        let (readers, writers) = state.ref_count();
        drop(state);
        self.broadcast_tx
            .send(OutboundMessage::UserJoined(UserJoinedData {
                session_id: self.session_id,
                client_id: client_id.to_string(),
                read_only: false,
            }))
            .ok();
        self.broadcast_session_info(revision, readers, writers);
        Ok((content, revision, tail))
    }

    /// Move `client_id` out of the writer band: demoted to reader if it
    /// holds an independent subscribe-level slot, removed entirely
    /// otherwise.
    pub async fn stop_editing(&self, client_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let Some(client) = state.clients.get_mut(client_id) else {
            return state.ref_count() == (0, 0);
        };
        let fully_detached = if client.subscribed {
            client.editing = false;
            false
        } else {
            state.clients.remove(client_id);
            true
        };
        let (readers, writers) = state.ref_count();
        let revision = state.current_version;
        let empty = (readers, writers) == (0, 0);
        drop(state);
        if fully_detached {
            self.broadcast_tx
                .send(OutboundMessage::UserLeft(UserLeftData {
                    session_id: self.session_id,
                    client_id: client_id.to_string(),
                }))
                .ok();
        }
        if !empty {
            self.broadcast_session_info(revision, readers, writers);
        }
        empty
    }

    /// The hot path (spec §4.4 `apply_operation`): validate against the
    /// current revision, transform forward through any intervening
    /// concurrent ops, apply, append to the tail, and cut a snapshot if due.
    #[instrument(skip(self, op))]
    pub async fn apply_operation(
        &self,
        client_id: &str,
        client_revision: u64,
        op: Operation,
    ) -> Result<AppliedOperation> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(ServerError::ShuttingDown);
        }

        let mut state = self.state.lock().await;

        if let Some(client) = state.clients.get(client_id) {
            if client.read_only {
                return Err(ServerError::PermissionDenied("client holds a read-only subscription"));
            }
        }

        if client_revision < state.snapshot_version || client_revision > state.current_version {
            return Err(ServerError::RevisionMismatch {
                client_revision,
                current_revision: state.current_version,
            });
        }

        let skip = (client_revision - state.snapshot_version) as usize;
        let mut transformed = op;
        for concurrent in &state.recent_ops[skip..] {
            let (_, b_prime) = transform(concurrent, &transformed)?;
            transformed = b_prime;
        }

        let document_length = state.utf16_len();
        if transformed.base_length() != document_length {
            return Err(ServerError::BaseLengthMismatch {
                op_base_length: transformed.base_length(),
                document_length,
            });
        }

        let content_before = state.snapshot_content_at_tail();
        let new_content = apply(&content_before, &transformed)?;
        state.recent_ops.push(transformed.clone());
        state.current_version += 1;
        let new_revision = state.current_version;

        let op_json = ot_core::to_json(&transformed);
        let session_id = self.session_id;
        let history = self.history.clone();
        let author = client_id.to_string();
        tokio::spawn(async move {
            let event = OperationEvent {
                session_id,
                revision: new_revision,
                op: op_json,
                author,
                timestamp: unix_now(),
            };
            if let Err(e) = history.on_operation(event).await {
                warn!("dropping operation history event for {session_id}: {e}");
            }
        });

        self.maybe_cut_snapshot(&mut state, new_content).await;
        drop(state);

        self.broadcast_tx
            .send(OutboundMessage::RemoteOperation(RemoteOperationData {
                session_id: self.session_id,
                author_client_id: client_id.to_string(),
                revision: new_revision,
                operation: ot_core::to_json(&transformed),
            }))
            .ok();

        Ok(AppliedOperation {
            new_revision,
            op_to_broadcast: transformed,
        })
    }

    async fn maybe_cut_snapshot(&self, state: &mut EditSessionState, new_content: String) {
        let ops_since_cut = state.recent_ops.len() as u32;
        let elapsed = unix_now() - state.last_snapshot_time;
        let due = ops_since_cut >= self.thresholds.max_ops_before_snapshot
            || elapsed as u64 >= self.thresholds.max_snapshot_interval_seconds;
        if !due {
            return;
        }

        let op_tail: Vec<serde_json::Value> =
            state.recent_ops.iter().map(ot_core::to_json).collect();
        let session_id = self.session_id;
        let revision = state.current_version;
        let history = self.history.clone();
        let content_for_history = new_content.clone();
        tokio::spawn(async move {
            let event = SnapshotEvent {
                session_id,
                revision,
                content: content_for_history,
                op_tail,
                author: "session".to_string(),
                timestamp: unix_now(),
            };
            if let Err(e) = history.on_snapshot(event).await {
                warn!("dropping snapshot history event for {session_id}: {e}");
            }
        });

        state.snapshot_content = new_content;
        state.snapshot_version = state.current_version;
        state.recent_ops.clear();
        state.last_snapshot_time = unix_now();
    }

    pub async fn cursor(&self, client_id: &str, position: usize, selection_end: usize) {
        let mut state = self.state.lock().await;
        if let Some(client) = state.clients.get_mut(client_id) {
            client.cursor = Some((position, selection_end));
            client.last_seen = unix_now();
        }
    }

    pub async fn heartbeat(&self, client_id: &str) {
        let mut state = self.state.lock().await;
        if let Some(client) = state.clients.get_mut(client_id) {
            client.last_seen = unix_now();
        }
    }

    pub async fn current_content(&self) -> String {
        self.state.lock().await.snapshot_content_at_tail()
    }

    pub async fn current_revision(&self) -> u64 {
        self.state.lock().await.current_version
    }

    pub async fn snapshot_info(&self) -> SnapshotInfo {
        let state = self.state.lock().await;
        let (readers, writers) = state.ref_count();
        SnapshotInfo {
            session_id: self.session_id,
            revision: state.current_version,
            readers,
            writers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collab_history::NullHistoryListener;
    use ot_core::OperationBuilder;

    fn session(content: &str) -> EditSession {
        EditSession::new(
            Uuid::new_v4(),
            "doc.txt".to_string(),
            content.to_string(),
            Arc::new(NullHistoryListener),
            ServerConfig::default(),
        )
    }

    #[tokio::test]
    async fn concurrent_inserts_converge() {
        let session = session("");
        session.subscribe("a", false).await;
        session.subscribe("b", false).await;

        let a_op = OperationBuilder::new().insert("Hello").build();
        let applied_a = session.apply_operation("a", 0, a_op).await.unwrap();
        assert_eq!(applied_a.new_revision, 1);

        let b_op = OperationBuilder::new().insert("Hi").build();
        let applied_b = session.apply_operation("b", 0, b_op).await.unwrap();
        assert_eq!(applied_b.new_revision, 2);

        assert_eq!(session.current_content().await, "HelloHi");
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let session = session("abc");
        session.subscribe("a", false).await;
        let op = OperationBuilder::new().retain(3).insert("!").build();
        let err = session.apply_operation("a", 99, op).await.unwrap_err();
        assert!(matches!(err, ServerError::RevisionMismatch { .. }));
    }

    #[tokio::test]
    async fn read_only_client_cannot_write() {
        let session = session("abc");
        session.subscribe("a", true).await;
        let op = OperationBuilder::new().retain(3).insert("!").build();
        let err = session.apply_operation("a", 0, op).await.unwrap_err();
        assert!(matches!(err, ServerError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn write_only_client_fully_detaches_on_stop_editing() {
        let session = session("");
        session.subscribe("reader-1", true).await;
        session.subscribe("reader-2", true).await;
        session.start_editing("writer").await.unwrap();

        let info = session.snapshot_info().await;
        assert_eq!((info.readers, info.writers), (2, 1));

        let destroyed = session.stop_editing("writer").await;
        assert!(!destroyed);
        let info = session.snapshot_info().await;
        assert_eq!((info.readers, info.writers), (2, 0));

        assert!(!session.unsubscribe("reader-1").await);
        assert!(session.unsubscribe("reader-2").await);
    }

    #[tokio::test]
    async fn idle_client_is_evicted_past_the_timeout() {
        let session = session("abc");
        session.subscribe("stale", false).await;
        session.subscribe("fresh", false).await;
        {
            let mut state = session.state.lock().await;
            state.clients.get_mut("stale").unwrap().last_seen -= 1_000;
        }
        let destroyed = session.evict_idle_clients(60).await;
        assert!(!destroyed);
        let info = session.snapshot_info().await;
        assert_eq!((info.readers, info.writers), (1, 0));
    }

    #[tokio::test]
    async fn evicting_the_last_client_reports_the_session_as_empty() {
        let session = session("abc");
        session.subscribe("stale", false).await;
        {
            let mut state = session.state.lock().await;
            state.clients.get_mut("stale").unwrap().last_seen -= 1_000;
        }
        assert!(session.evict_idle_clients(60).await);
    }

    #[tokio::test]
    async fn operations_are_rejected_once_shutting_down() {
        let session = session("abc");
        session.subscribe("a", false).await;
        session.mark_shutting_down();
        let op = OperationBuilder::new().retain(3).insert("!").build();
        let err = session.apply_operation("a", 0, op).await.unwrap_err();
        assert!(matches!(err, ServerError::ShuttingDown));
    }
}
