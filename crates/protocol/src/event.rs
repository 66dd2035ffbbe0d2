//! Event-Protokoll
//!
//! Definiert die Event-Namen, die Fehlertexte und den Frame-Umschlag, die
//! zwischen Client und Signalhub ausgetauscht werden.
//!
//! ## Design
//! - Jede Nachricht ist ein benanntes Event mit einer Argumentliste
//!   (`Vec<serde_json::Value>`), kompatibel zu Socket.io-artigen Clients
//! - Optionale `ack`-ID: der Server beantwortet das Event mit einem
//!   `Ack`-Frame, der die Completion-Argumente `(success, daten|fehler)` traegt
//! - Tagged Enum fuer den Frame-Typ

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::HandshakeQuery;

// ---------------------------------------------------------------------------
// Event-Namen
// ---------------------------------------------------------------------------

/// Namen aller eingehenden und ausgehenden Events
pub mod events {
    // --- Eingehend: Raum-Verwaltung ---
    pub const OPEN_ROOM: &str = "open-room";
    pub const JOIN_ROOM: &str = "join-room";
    pub const CHECK_PRESENCE: &str = "check-presence";
    pub const GET_PUBLIC_ROOMS: &str = "get-public-rooms";
    pub const SET_PASSWORD: &str = "set-password";
    pub const IS_VALID_PASSWORD: &str = "is-valid-password";
    pub const CLOSE_ENTIRE_SESSION: &str = "close-entire-session";

    // --- Eingehend: Benutzer-Verwaltung ---
    pub const EXTRA_DATA_UPDATED: &str = "extra-data-updated";
    pub const GET_REMOTE_USER_EXTRA_DATA: &str = "get-remote-user-extra-data";
    pub const CHANGED_UUID: &str = "changed-uuid";
    pub const DISCONNECT_WITH: &str = "disconnect-with";
    pub const SET_CUSTOM_SOCKET_EVENT_LISTENER: &str = "set-custom-socket-event-listener";

    // --- Keepalive (beide Richtungen) ---
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";

    // --- Ausgehend ---
    pub const USERID_ALREADY_TAKEN: &str = "userid-already-taken";
    pub const USER_CONNECTED: &str = "user-connected";
    pub const USER_DISCONNECTED: &str = "user-disconnected";
    pub const USER_NOT_FOUND: &str = "user-not-found";
    pub const SET_IS_INITIATOR_TRUE: &str = "set-isInitiator-true";
    pub const KICKED: &str = "kicked";
    pub const ROOM_CLOSED: &str = "room-closed";

    /// Alle fest belegten Event-Namen (duerfen nicht als Custom-Event registriert werden)
    pub const RESERVIERT: &[&str] = &[
        OPEN_ROOM,
        JOIN_ROOM,
        CHECK_PRESENCE,
        GET_PUBLIC_ROOMS,
        SET_PASSWORD,
        IS_VALID_PASSWORD,
        CLOSE_ENTIRE_SESSION,
        EXTRA_DATA_UPDATED,
        GET_REMOTE_USER_EXTRA_DATA,
        CHANGED_UUID,
        DISCONNECT_WITH,
        SET_CUSTOM_SOCKET_EVENT_LISTENER,
        PING,
        PONG,
        USERID_ALREADY_TAKEN,
        USER_CONNECTED,
        USER_DISCONNECTED,
        USER_NOT_FOUND,
        SET_IS_INITIATOR_TRUE,
        KICKED,
        ROOM_CLOSED,
    ];

    /// Prueft ob ein Event-Name fest belegt ist
    pub fn ist_reserviert(name: &str) -> bool {
        RESERVIERT.contains(&name)
    }
}

/// Standard-Name des generischen Signaling-Events
pub const STANDARD_NACHRICHTEN_EVENT: &str = "RTCMultiConnection-Message";

/// Pseudo-Ziel fuer Server-Anfragen (z.B. Presence-Erkennung)
pub const SYSTEM_ZIEL: &str = "system";

// ---------------------------------------------------------------------------
// Fehlertexte
// ---------------------------------------------------------------------------

/// Fehlertexte, die Clients in Completions erhalten
///
/// Clients vergleichen diese Strings woertlich, sie sind Teil des Protokolls.
pub mod meldungen {
    pub const ROOM_NOT_AVAILABLE: &str = "Room not available";
    pub const ROOM_FULL: &str = "Room full";
    pub const INVALID_PASSWORD: &str = "Invalid password";
    pub const ROOM_PERMISSION_DENIED: &str = "Room permission denied";
    pub const USERID_NOT_AVAILABLE: &str = "User not available";
    pub const USERID_ALREADY_TAKEN: &str = "Userid already taken";
    pub const DID_NOT_JOIN_ANY_ROOM: &str = "Did not join any room";
    pub const PUBLIC_IDENTIFIER_MISSING: &str = "Public identifier missing";
    pub const INVALID_REQUEST: &str = "Invalid request";
    pub const PASSWORD_MISSING: &str = "You did not enter the password.";
    pub const ROOM_ID_MISSING: &str = "You did not enter the room-id.";
    pub const ROOM_HAS_NO_PASSWORD: &str = "This room do not have any password.";
    pub const INTERNAL_ERROR: &str = "Internal error";
}

// ---------------------------------------------------------------------------
// Frame (Umschlag fuer alle Nachrichten)
// ---------------------------------------------------------------------------

/// Ein einzelner Frame des Event-Protokolls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Erster Frame jeder Verbindung (Client -> Server)
    Handshake(HandshakeQuery),
    /// Benanntes Event (beide Richtungen)
    Event {
        event: String,
        #[serde(default)]
        args: Vec<Value>,
        /// Gesetzt wenn der Absender eine Completion erwartet
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack: Option<u32>,
    },
    /// Completion auf ein Event mit `ack`-ID (Server -> Client)
    Ack {
        ack: u32,
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl Frame {
    /// Erstellt ein Event ohne Completion-Wunsch
    pub fn event(event: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Event {
            event: event.into(),
            args,
            ack: None,
        }
    }

    /// Erstellt ein Event mit Completion-Wunsch
    pub fn event_mit_ack(event: impl Into<String>, args: Vec<Value>, ack: u32) -> Self {
        Self::Event {
            event: event.into(),
            args,
            ack: Some(ack),
        }
    }

    /// Erstellt eine Completion
    pub fn ack(ack: u32, args: Vec<Value>) -> Self {
        Self::Ack { ack, args }
    }

    /// Serialisiert den Frame als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert einen Frame aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_frame_format() {
        let frame = Frame::event_mit_ack(events::OPEN_ROOM, vec![json!({"sessionid": "r1"})], 7);
        let wert: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(wert["type"], "event");
        assert_eq!(wert["event"], "open-room");
        assert_eq!(wert["ack"], 7);
        assert_eq!(wert["args"][0]["sessionid"], "r1");
    }

    #[test]
    fn event_ohne_ack_laesst_feld_weg() {
        let frame = Frame::event(events::USER_CONNECTED, vec![json!("bob")]);
        let json = frame.to_json().unwrap();
        assert!(!json.contains("\"ack\""));
    }

    #[test]
    fn handshake_aus_client_json() {
        let json = r#"{"type":"handshake","userid":"alice","msgEvent":"custom-msg"}"#;
        let frame = Frame::from_json(json).unwrap();
        match frame {
            Frame::Handshake(q) => {
                assert_eq!(q.userid.as_deref(), Some("alice"));
                assert_eq!(q.msg_event.as_deref(), Some("custom-msg"));
                assert!(q.sessionid.is_none());
            }
            anderes => panic!("Erwartet Handshake, erhalten: {anderes:?}"),
        }
    }

    #[test]
    fn event_ohne_args_ist_leere_liste() {
        let frame = Frame::from_json(r#"{"type":"event","event":"close-entire-session","ack":3}"#)
            .unwrap();
        assert_eq!(
            frame,
            Frame::Event {
                event: "close-entire-session".into(),
                args: vec![],
                ack: Some(3),
            }
        );
    }

    #[test]
    fn reservierte_namen() {
        assert!(events::ist_reserviert("open-room"));
        assert!(events::ist_reserviert("pong"));
        assert!(!events::ist_reserviert("chat-message"));
        assert!(!events::ist_reserviert(STANDARD_NACHRICHTEN_EVENT));
    }
}
