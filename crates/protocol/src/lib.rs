//! signalhub-protocol – Event-Protokoll fuer Signalhub
//!
//! Dieses Crate definiert die Event-Namen, die typisierten Argumente und das
//! Frame-Format, die zwischen Client und Signalhub ausgetauscht werden.

pub mod event;
pub mod payload;
pub mod wire;

pub use event::{events, meldungen, Frame, STANDARD_NACHRICHTEN_EVENT, SYSTEM_ZIEL};
pub use payload::{HandshakeQuery, JoinRoomRequest, OpenRoomRequest, PublicRoom, SessionFlags};
pub use wire::FrameCodec;
