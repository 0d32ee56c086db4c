//! The outbound message set from spec §4.6.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeData {
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    pub session_id: Uuid,
    pub revision: u64,
    pub content: String,
    /// Wire-encoded (`ot_core::codec`) tail of operations applied since this
    /// snapshot was cut, so a client can catch up without a second round trip.
    pub recent_ops: Vec<Value>,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOperationData {
    pub session_id: Uuid,
    pub author_client_id: String,
    pub revision: u64,
    pub operation: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AckData {
    pub session_id: Uuid,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserJoinedData {
    pub session_id: Uuid,
    pub client_id: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLeftData {
    pub session_id: Uuid,
    pub client_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionInfoData {
    pub session_id: Uuid,
    pub revision: u64,
    pub readers: u32,
    pub writers: u32,
}

/// One strongly-typed outbound notification, ready to be wrapped in a
/// [`crate::frame::Frame`] and sent down the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Welcome(WelcomeData),
    Snapshot(SnapshotData),
    RemoteOperation(RemoteOperationData),
    Ack(AckData),
    Error(ErrorData),
    UserJoined(UserJoinedData),
    UserLeft(UserLeftData),
    SessionInfo(SessionInfoData),
}

impl OutboundMessage {
    /// The wire `type` string this message serializes its data under.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            OutboundMessage::Welcome(_) => "welcome",
            OutboundMessage::Snapshot(_) => "snapshot",
            OutboundMessage::RemoteOperation(_) => "remote_operation",
            OutboundMessage::Ack(_) => "ack",
            OutboundMessage::Error(_) => "error",
            OutboundMessage::UserJoined(_) => "user_joined",
            OutboundMessage::UserLeft(_) => "user_left",
            OutboundMessage::SessionInfo(_) => "session_info",
        }
    }

    /// The session this message concerns, if any (every variant but
    /// `Welcome` is scoped to one session).
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            OutboundMessage::Welcome(_) => None,
            OutboundMessage::Snapshot(d) => Some(d.session_id),
            OutboundMessage::RemoteOperation(d) => Some(d.session_id),
            OutboundMessage::Ack(d) => Some(d.session_id),
            OutboundMessage::Error(d) => d.session_id,
            OutboundMessage::UserJoined(d) => Some(d.session_id),
            OutboundMessage::UserLeft(d) => Some(d.session_id),
            OutboundMessage::SessionInfo(d) => Some(d.session_id),
        }
    }

    /// Serialize this message's payload into the `data` field of a frame's
    /// inner `protocol_message`.
    #[must_use]
    pub fn to_data(&self) -> Value {
        match self {
            OutboundMessage::Welcome(d) => serde_json::to_value(d),
            OutboundMessage::Snapshot(d) => serde_json::to_value(d),
            OutboundMessage::RemoteOperation(d) => serde_json::to_value(d),
            OutboundMessage::Ack(d) => serde_json::to_value(d),
            OutboundMessage::Error(d) => serde_json::to_value(d),
            OutboundMessage::UserJoined(d) => serde_json::to_value(d),
            OutboundMessage::UserLeft(d) => serde_json::to_value(d),
            OutboundMessage::SessionInfo(d) => serde_json::to_value(d),
        }
        .expect("outbound payload types are always serializable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_carries_stable_code() {
        let msg = OutboundMessage::Error(ErrorData {
            code: ErrorCode::SessionNotFound,
            message: "no such session".into(),
            session_id: None,
        });
        assert_eq!(msg.message_type(), "error");
        assert_eq!(msg.to_data()["code"], serde_json::json!("session_not_found"));
    }

    #[test]
    fn snapshot_carries_session_id() {
        let id = Uuid::new_v4();
        let msg = OutboundMessage::Snapshot(SnapshotData {
            session_id: id,
            revision: 3,
            content: "abc".into(),
            recent_ops: vec![],
            read_only: false,
        });
        assert_eq!(msg.session_id(), Some(id));
    }
}
