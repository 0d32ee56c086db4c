//! Server-side error taxonomy (spec §7): validation, precondition, capacity,
//! and fatal kinds, each carrying the stable wire error code the protocol
//! handler serializes into an outbound `error` frame.

use collab_proto::ErrorCode;

/// Errors a session, broker, or protocol handler can raise while servicing
/// one inbound message.
///
/// Validation and precondition errors are reported to the offending client
/// only and leave session state untouched; capacity errors degrade (drop
/// history, disconnect a slow client); fatal errors terminate the session.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("malformed {what}: {detail}")]
    Validation { what: &'static str, detail: String },

    #[error("revision mismatch: client sent {client_revision}, session is at {current_revision}")]
    RevisionMismatch {
        client_revision: u64,
        current_revision: u64,
    },

    #[error("operation base length {op_base_length} does not match document length {document_length}")]
    BaseLengthMismatch {
        op_base_length: usize,
        document_length: usize,
    },

    #[error("session {0} not found")]
    SessionNotFound(uuid::Uuid),

    #[error("unauthorized")]
    Unauthorized,

    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    #[error("server is shutting down")]
    ShuttingDown,

    #[error("history queue full, event dropped")]
    HistoryQueueFull,

    #[error("client outbound channel exceeded its write deadline")]
    WriteDeadlineExceeded,

    #[error("internal consistency violation: {0}")]
    Fatal(String),

    #[error(transparent)]
    OtAlgebra(#[from] ot_core::OtError),

    #[error(transparent)]
    History(#[from] collab_history::HistoryError),
}

impl ServerError {
    /// Maps onto the stable wire error-code string a client matches on.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ServerError::Validation { what, .. } => match *what {
                "subscribe" => ErrorCode::InvalidSubscribeData,
                "unsubscribe" => ErrorCode::InvalidUnsubscribeData,
                "start_editing" => ErrorCode::InvalidStartEditingData,
                "stop_editing" => ErrorCode::InvalidStopEditingData,
                "operation" => ErrorCode::InvalidOperationData,
                _ => ErrorCode::OperationFailed,
            },
            ServerError::RevisionMismatch { .. } | ServerError::BaseLengthMismatch { .. } => {
                ErrorCode::InvalidOperation
            }
            ServerError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            ServerError::Unauthorized => ErrorCode::Unauthorized,
            ServerError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            ServerError::ShuttingDown => ErrorCode::ShuttingDown,
            ServerError::HistoryQueueFull
            | ServerError::WriteDeadlineExceeded
            | ServerError::Fatal(_)
            | ServerError::OtAlgebra(_)
            | ServerError::History(_) => ErrorCode::OperationFailed,
        }
    }

    /// Whether this error should terminate the session, per §7 "fatal".
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServerError::Fatal(_))
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
