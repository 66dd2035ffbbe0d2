//! signalhub-signaling – Raum-Verzeichnis, Router und Heartbeat
//!
//! Dieser Crate implementiert den Kern des Signalhub: Benutzer und Raeume,
//! die Weiterleitung von Signaling-Nachrichten zwischen Benutzern, die
//! Lebendigkeitspruefung der Verbindungen und einen TCP-Transport.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task, ChannelSocket)
//!     |
//!     v
//! SignalingHub ──> MessageRouter
//!     |                +-- room_handler   (open, join, presence, password, close)
//!     |                +-- user_handler   (extra, uuid, disconnect-with, custom events)
//!     |                +-- relay_handler  (Signaling-Nachrichten, Custom-Events)
//!     |
//!     +── cleanup (genau einmal pro Verbindung)
//!
//! RoomDirectory    – Benutzer, Raeume, Paarungen (ein Mutex, atomare Schritte)
//! HeartbeatManager – Ping/Pong pro Socket, meldet tote Verbindungen
//! ```

pub mod cleanup;
pub mod connection;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod heartbeat;
pub mod hub;
pub mod router;
pub mod server_state;
pub mod socket;
pub mod tcp;

// Bequeme Re-Exporte
pub use connection::{ClientConnection, VerbindungsConfig};
pub use directory::{RoomDirectory, RoomInfo, UserInfo};
pub use error::{FehlerKategorie, SignalingError, SignalingResult};
pub use heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatManager, HeartbeatStatus};
pub use hub::{SignalingHub, VerbindungsStatistik};
pub use router::MessageRouter;
pub use server_state::{SignalingConfig, SignalingState, TrennCallback};
pub use socket::{AusgehendesEvent, ChannelSocket, SignalingSocket, SocketHandle};
pub use tcp::SignalingServer;
