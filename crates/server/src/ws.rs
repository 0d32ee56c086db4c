//! Protocol handler (C6): the axum WebSocket transport. One task reads
//! frames off the socket and dispatches them against the broker/session
//! layer; a second drains a bounded per-client outbound queue back onto the
//! socket, enforcing the write deadline from spec §4.6 "Back-pressure". A
//! forwarder task per joined session relays that session's broadcast stream
//! (`remote_operation`/`user_joined`/`user_left`) into the same queue.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use collab_proto::{
    inbound::{
        CursorData, HeartbeatData, OperationData, StartEditingData, StopEditingData,
        SubscribeData, UnsubscribeData,
    },
    outbound::{AckData, ErrorData, SnapshotData, WelcomeData},
    Frame, InboundMessage, OutboundMessage,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::ServerError;
use crate::session::EditSession;
use crate::state::AppState;

/// Queue depth for a client's outbound mailbox; a slow reader that fills
/// this backs up into the write-deadline disconnect below rather than
/// growing without bound.
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Optional bearer token carried as a query parameter on the upgrade
/// request, since a WebSocket handshake cannot carry a body and browsers
/// restrict custom headers on it.
#[derive(serde::Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

/// Establishes `client_id` before any session traffic (spec §6): a
/// presented token is resolved through the authenticator to its owning
/// user, rejecting the upgrade outright if it doesn't validate; with no
/// token at all, a fresh surrogate id is minted instead.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> Response {
    let client_id = match params.token {
        Some(token) => match state.authenticator.authenticate(&token).await {
            Ok(user) => user.id,
            Err(_) => return (StatusCode::UNAUTHORIZED, "invalid or expired token").into_response(),
        },
        None => Uuid::new_v4().to_string(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
        .into_response()
}

/// Per-session bookkeeping for one connection: the forwarder task relaying
/// that session's broadcast stream into this client's outbound queue.
struct Joined {
    forwarder: JoinHandle<()>,
}

#[instrument(skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState, client_id: String) {
    info!(client_id, "client connected");

    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_QUEUE_CAPACITY);
    let deadline = Duration::from_millis(state.config.server.client_write_deadline_ms);

    let writer_client_id = client_id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let frame = frame_for(&writer_client_id, &msg);
            let text = match serde_json::to_string(&frame) {
                Ok(t) => t,
                Err(e) => {
                    warn!("failed to serialize outbound frame: {e}");
                    continue;
                }
            };
            match tokio::time::timeout(deadline, sink.send(Message::Text(text.into()))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("write to {writer_client_id} failed: {e}");
                    break;
                }
                Err(_) => {
                    warn!("{writer_client_id} exceeded write deadline, disconnecting");
                    break;
                }
            }
        }
    });

    outbound_tx
        .send(OutboundMessage::Welcome(WelcomeData {
            client_id: client_id.clone(),
        }))
        .await
        .ok();

    let mut joined: HashMap<Uuid, Joined> = HashMap::new();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let Some(incoming) = incoming else { break };
                let Ok(Message::Text(text)) = incoming else {
                    if matches!(incoming, Ok(Message::Close(_)) | Err(_)) {
                        break;
                    }
                    continue;
                };
                let frame: Frame = match serde_json::from_str(&text) {
                    Ok(f) => f,
                    Err(e) => {
                        send_error(&outbound_tx, None, ServerError::Validation {
                            what: "frame",
                            detail: e.to_string(),
                        }).await;
                        continue;
                    }
                };
                handle_frame(&state, &client_id, frame, &outbound_tx, &mut joined).await;
            }
            _ = &mut writer => break,
        }
    }

    for (session_id, entry) in joined.drain() {
        entry.forwarder.abort();
        if let Some(session) = state.broker.get(session_id) {
            if session.unsubscribe(&client_id).await {
                state.broker.destroy_session(session_id);
            }
        }
    }
    writer.abort();
    info!(client_id, "client disconnected");
}

fn frame_for(client_id: &str, msg: &OutboundMessage) -> Frame {
    Frame::new(
        "message",
        client_id,
        None,
        msg.session_id(),
        msg.message_type(),
        msg.to_data(),
        collab_common::ids::unix_now(),
    )
}

async fn send_error(tx: &mpsc::Sender<OutboundMessage>, session_id: Option<Uuid>, err: ServerError) {
    let data = ErrorData {
        code: err.code(),
        message: err.to_string(),
        session_id,
    };
    tx.send(OutboundMessage::Error(data)).await.ok();
}

/// Ensure a forwarder task is running for `session`, relaying its broadcast
/// stream into `tx` for the lifetime of this connection. Messages this
/// client itself authored are skipped — it already learns of its own
/// operations via `ack` and doesn't need to hear its own `user_joined`.
fn ensure_forwarder(
    joined: &mut HashMap<Uuid, Joined>,
    session: &EditSession,
    client_id: String,
    tx: mpsc::Sender<OutboundMessage>,
) {
    if joined.contains_key(&session.session_id) {
        return;
    }
    let mut rx = session.subscribe_broadcast();
    let forwarder = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) if authored_by(&msg, &client_id) => {}
                Ok(msg) => {
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    joined.insert(session.session_id, Joined { forwarder });
}

fn authored_by(msg: &OutboundMessage, client_id: &str) -> bool {
    match msg {
        OutboundMessage::RemoteOperation(d) => d.author_client_id == client_id,
        OutboundMessage::UserJoined(d) => d.client_id == client_id,
        OutboundMessage::UserLeft(d) => d.client_id == client_id,
        _ => false,
    }
}

async fn handle_frame(
    state: &AppState,
    client_id: &str,
    frame: Frame,
    tx: &mpsc::Sender<OutboundMessage>,
    joined: &mut HashMap<Uuid, Joined>,
) {
    let inner = frame.metadata.protocol_message;
    let inbound = match InboundMessage::decode(&inner) {
        Ok(m) => m,
        Err(e) => {
            send_error(
                tx,
                inner.session_id,
                ServerError::Validation {
                    what: "message",
                    detail: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    let result = dispatch(state, client_id, inbound, tx, joined).await;
    if let Err(e) = result {
        send_error(tx, inner.session_id, e).await;
    }
}

async fn dispatch(
    state: &AppState,
    client_id: &str,
    inbound: InboundMessage,
    tx: &mpsc::Sender<OutboundMessage>,
    joined: &mut HashMap<Uuid, Joined>,
) -> Result<(), ServerError> {
    match inbound {
        InboundMessage::Subscribe(SubscribeData {
            file_path,
            read_only,
            ..
        }) => {
            let (session, _) = state.broker.get_or_create_session(&file_path).await?;
            ensure_forwarder(joined, &session, client_id.to_string(), tx.clone());
            let (content, revision, tail) = session.subscribe(client_id, read_only).await;
            tx.send(OutboundMessage::Snapshot(SnapshotData {
                session_id: session.session_id,
                revision,
                content,
                recent_ops: tail.iter().map(ot_core::to_json).collect(),
                read_only,
            }))
            .await
            .ok();
        }
        InboundMessage::Unsubscribe(UnsubscribeData { session_id }) => {
            let session = state.broker.get_or_not_found(session_id)?;
            let destroyed = session.unsubscribe(client_id).await;
            if let Some(entry) = joined.remove(&session_id) {
                entry.forwarder.abort();
            }
            if destroyed {
                state.broker.destroy_session(session_id);
            }
        }
        InboundMessage::StartEditing(StartEditingData { file_path, .. }) => {
            let (session, _) = state.broker.get_or_create_session(&file_path).await?;
            ensure_forwarder(joined, &session, client_id.to_string(), tx.clone());
            let (content, revision, tail) = session.start_editing(client_id).await?;
            tx.send(OutboundMessage::Snapshot(SnapshotData {
                session_id: session.session_id,
                revision,
                content,
                recent_ops: tail.iter().map(ot_core::to_json).collect(),
                read_only: false,
            }))
            .await
            .ok();
        }
        InboundMessage::StopEditing(StopEditingData { session_id }) => {
            let session = state.broker.get_or_not_found(session_id)?;
            let destroyed = session.stop_editing(client_id).await;
            if destroyed {
                if let Some(entry) = joined.remove(&session_id) {
                    entry.forwarder.abort();
                }
                state.broker.destroy_session(session_id);
            }
        }
        InboundMessage::Operation(OperationData {
            session_id,
            revision,
            operation,
            ..
        }) => {
            let session = state.broker.get_or_not_found(session_id)?;
            let op = ot_core::from_json(&operation).map_err(ServerError::OtAlgebra)?;
            let applied = session.apply_operation(client_id, revision, op).await?;
            tx.send(OutboundMessage::Ack(AckData {
                session_id,
                revision: applied.new_revision,
            }))
            .await
            .ok();
        }
        InboundMessage::Cursor(CursorData {
            session_id,
            position,
            selection_end,
        }) => {
            let session = state.broker.get_or_not_found(session_id)?;
            session.cursor(client_id, position, selection_end).await;
        }
        InboundMessage::Heartbeat(HeartbeatData { session_ids }) => {
            for session_id in session_ids {
                if let Some(session) = state.broker.get(session_id) {
                    session.heartbeat(client_id).await;
                }
            }
        }
    }
    Ok(())
}
