//! The outer frame envelope described in spec §4.6 "Framing".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One JSON object carried over the transport. The semantic payload lives in
/// `metadata.protocol_message`; the outer fields (`type`, `client_id`,
/// `doc_id`, `timestamp`) are transport-level envelope, not protocol content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    pub timestamp: i64,
    pub metadata: FrameMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub protocol_message: ProtocolMessage,
}

/// The inner semantic request/response, addressed by `message_type` and
/// (for anything but the very first `subscribe`/`start_editing`) a
/// `session_id` used for routing per the "Multiplexing" rule in §4.6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub timestamp: i64,
    pub data: Value,
}

impl Frame {
    /// Build a frame wrapping `message_type`/`data`, stamping both envelope
    /// and inner timestamps with `now`.
    #[must_use]
    pub fn new(
        frame_type: impl Into<String>,
        client_id: impl Into<String>,
        doc_id: Option<String>,
        session_id: Option<Uuid>,
        message_type: impl Into<String>,
        data: Value,
        now: i64,
    ) -> Self {
        Frame {
            frame_type: frame_type.into(),
            client_id: client_id.into(),
            doc_id,
            timestamp: now,
            metadata: FrameMetadata {
                protocol_message: ProtocolMessage {
                    message_type: message_type.into(),
                    session_id,
                    timestamp: now,
                    data,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_through_json() {
        let frame = Frame::new(
            "message",
            "client-1",
            Some("doc.txt".into()),
            None,
            "subscribe",
            serde_json::json!({"file_path": "doc.txt", "read_only": false}),
            1_700_000_000,
        );
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }
}
