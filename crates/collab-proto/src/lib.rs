//! Wire types for the collaborative editing protocol (spec §4.6): the frame
//! envelope, the inbound and outbound message sets, and the stable wire
//! error-code strings. No networking logic lives here — `server::ws` owns
//! routing and the axum WebSocket transport.

pub mod error;
pub mod frame;
pub mod inbound;
pub mod outbound;

pub use error::{ErrorCode, ProtoError};
pub use frame::{Frame, FrameMetadata, ProtocolMessage};
pub use inbound::InboundMessage;
pub use outbound::OutboundMessage;
