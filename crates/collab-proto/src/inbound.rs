//! The inbound message set from spec §4.6.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ProtoError;
use crate::frame::ProtocolMessage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeData {
    pub file_path: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub use_sse: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsubscribeData {
    pub session_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartEditingData {
    pub file_path: String,
    #[serde(default)]
    pub initial_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopEditingData {
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub position: usize,
    pub selection_end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationData {
    pub session_id: Uuid,
    pub revision: u64,
    /// The wire array form (`ot_core::codec`), decoded downstream by the
    /// session layer so this crate stays independent of `ot-core`.
    pub operation: Value,
    #[serde(default)]
    pub selection: Option<Selection>,
}

/// `cursor` is routed like every other per-session inbound message (§4.6
/// "Multiplexing" routes "by `session_id`"), so it carries one even though
/// the summary table in §4.6 abbreviates its payload to just the position —
/// see DESIGN.md for this resolved ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorData {
    pub session_id: Uuid,
    pub position: usize,
    pub selection_end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatData {
    pub session_ids: Vec<Uuid>,
}

/// One decoded, strongly-typed inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Subscribe(SubscribeData),
    Unsubscribe(UnsubscribeData),
    StartEditing(StartEditingData),
    StopEditing(StopEditingData),
    Operation(OperationData),
    Cursor(CursorData),
    Heartbeat(HeartbeatData),
}

impl InboundMessage {
    /// Decode `msg.data` according to `msg.message_type`.
    ///
    /// # Errors
    /// [`ProtoError::UnknownMessageType`] if the type isn't one of the seven
    /// in spec §4.6; [`ProtoError::MalformedPayload`] if `data` doesn't match
    /// the shape the type requires.
    pub fn decode(msg: &ProtocolMessage) -> Result<Self, ProtoError> {
        let payload = |kind: &'static str| {
            move |e: serde_json::Error| ProtoError::MalformedPayload {
                kind,
                detail: e.to_string(),
            }
        };
        match msg.message_type.as_str() {
            "subscribe" => serde_json::from_value(msg.data.clone())
                .map(InboundMessage::Subscribe)
                .map_err(payload("subscribe")),
            "unsubscribe" => serde_json::from_value(msg.data.clone())
                .map(InboundMessage::Unsubscribe)
                .map_err(payload("unsubscribe")),
            "start_editing" => serde_json::from_value(msg.data.clone())
                .map(InboundMessage::StartEditing)
                .map_err(payload("start_editing")),
            "stop_editing" => serde_json::from_value(msg.data.clone())
                .map(InboundMessage::StopEditing)
                .map_err(payload("stop_editing")),
            "operation" => serde_json::from_value(msg.data.clone())
                .map(InboundMessage::Operation)
                .map_err(payload("operation")),
            "cursor" => serde_json::from_value(msg.data.clone())
                .map(InboundMessage::Cursor)
                .map_err(payload("cursor")),
            "heartbeat" => serde_json::from_value(msg.data.clone())
                .map(InboundMessage::Heartbeat)
                .map_err(payload("heartbeat")),
            other => Err(ProtoError::UnknownMessageType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(message_type: &str, data: Value) -> ProtocolMessage {
        ProtocolMessage {
            message_type: message_type.to_string(),
            session_id: None,
            timestamp: 0,
            data,
        }
    }

    #[test]
    fn decodes_subscribe() {
        let m = msg(
            "subscribe",
            serde_json::json!({"file_path": "a.txt", "read_only": true}),
        );
        let decoded = InboundMessage::decode(&m).unwrap();
        assert_eq!(
            decoded,
            InboundMessage::Subscribe(SubscribeData {
                file_path: "a.txt".into(),
                read_only: true,
                use_sse: None,
            })
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let m = msg("not_a_real_type", serde_json::json!({}));
        assert!(matches!(
            InboundMessage::decode(&m),
            Err(ProtoError::UnknownMessageType(_))
        ));
    }

    #[test]
    fn malformed_operation_payload_is_rejected() {
        let m = msg("operation", serde_json::json!({"revision": "not a number"}));
        assert!(matches!(
            InboundMessage::decode(&m),
            Err(ProtoError::MalformedPayload { kind: "operation", .. })
        ));
    }
}
