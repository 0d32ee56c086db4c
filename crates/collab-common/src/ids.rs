//! Small id/timestamp helpers shared by `server` and `collab-history`.

use uuid::Uuid;

/// Mint a fresh session id.
#[must_use]
pub fn new_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Current Unix timestamp in seconds, matching the "Timestamps are Unix
/// seconds" convention from the wire protocol.
#[must_use]
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
