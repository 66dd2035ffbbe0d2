//! signalhub-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Identifikationstypen bereit, die von Protokoll,
//! Signaling-Kern und Server gemeinsam genutzt werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{RoomId, SocketId, UserId};
