//! The stable wire error-code strings from spec §4.6, and the protocol-level
//! error type that carries one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stable, wire-visible error code. `Display`/`Serialize` both render the
/// exact snake_case string named in spec §4.6 — clients match on this string,
/// so its `Display` impl is part of the public contract, not debug output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidSubscribeData,
    InvalidUnsubscribeData,
    InvalidStartEditingData,
    InvalidStopEditingData,
    InvalidOperationData,
    InvalidOperation,
    OperationFailed,
    SessionNotFound,
    Unauthorized,
    PermissionDenied,
    ShuttingDown,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidSubscribeData => "invalid_subscribe_data",
            ErrorCode::InvalidUnsubscribeData => "invalid_unsubscribe_data",
            ErrorCode::InvalidStartEditingData => "invalid_start_editing_data",
            ErrorCode::InvalidStopEditingData => "invalid_stop_editing_data",
            ErrorCode::InvalidOperationData => "invalid_operation_data",
            ErrorCode::InvalidOperation => "invalid_operation",
            ErrorCode::OperationFailed => "operation_failed",
            ErrorCode::SessionNotFound => "session_not_found",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::ShuttingDown => "shutting_down",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while decoding an inbound frame or its inner protocol
/// message, before any session state is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtoError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("malformed {kind} payload: {detail}")]
    MalformedPayload { kind: &'static str, detail: String },
    #[error("unknown inbound message type: {0}")]
    UnknownMessageType(String),
}

impl ProtoError {
    /// The wire error code this decode failure should be reported as.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ProtoError::MalformedFrame(_) => ErrorCode::InvalidOperationData,
            ProtoError::MalformedPayload { kind, .. } => match *kind {
                "subscribe" => ErrorCode::InvalidSubscribeData,
                "unsubscribe" => ErrorCode::InvalidUnsubscribeData,
                "start_editing" => ErrorCode::InvalidStartEditingData,
                "stop_editing" => ErrorCode::InvalidStopEditingData,
                "operation" => ErrorCode::InvalidOperationData,
                _ => ErrorCode::InvalidOperationData,
            },
            ProtoError::UnknownMessageType(_) => ErrorCode::InvalidOperationData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_renders_wire_string() {
        assert_eq!(ErrorCode::SessionNotFound.as_str(), "session_not_found");
        assert_eq!(ErrorCode::SessionNotFound.to_string(), "session_not_found");
    }

    #[test]
    fn error_code_serializes_to_wire_string() {
        let json = serde_json::to_value(ErrorCode::PermissionDenied).unwrap();
        assert_eq!(json, serde_json::json!("permission_denied"));
    }
}
