//! Typisierte Event-Argumente
//!
//! Clients schicken Objekte in camelCase bzw. mit den historischen
//! Kleinschreibungs-Namen (`sessionid`, `userid`). Unbekannte Felder werden
//! ignoriert, fehlende optionale Felder bekommen Standardwerte.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use signalhub_core::{RoomId, UserId};

// ---------------------------------------------------------------------------
// Session-Flags
// ---------------------------------------------------------------------------

/// Aushandlungs-Hinweise eines Raums
///
/// Der Server wertet nur `oneway` und `broadcast` aus (Routing und
/// Besitzer-Weggang), der Rest wird unveraendert weitergereicht.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFlags {
    pub audio: bool,
    pub video: bool,
    pub oneway: bool,
    pub broadcast: bool,
    pub scalable: bool,
}

impl SessionFlags {
    /// Einweg-Raum: nur der Besitzer sendet an alle
    pub fn ist_einweg(&self) -> bool {
        self.oneway || self.broadcast
    }
}

// ---------------------------------------------------------------------------
// Anfragen
// ---------------------------------------------------------------------------

/// Argument von `open-room`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenRoomRequest {
    /// Raum-ID; fehlt sie, gilt die Session-ID aus dem Handshake
    pub sessionid: Option<RoomId>,
    pub session: SessionFlags,
    pub extra: Option<Value>,
    pub identifier: Option<String>,
    pub password: Option<String>,
}

/// Argument von `join-room`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    pub sessionid: RoomId,
    #[serde(default)]
    pub session: Option<SessionFlags>,
    #[serde(default)]
    pub extra: Option<Value>,
    #[serde(default)]
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Antworten
// ---------------------------------------------------------------------------

/// Eintrag in der Antwort auf `get-public-rooms`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRoom {
    pub sessionid: RoomId,
    pub owner: UserId,
    pub participants: Vec<UserId>,
    pub max_participants_allowed: usize,
    pub session: SessionFlags,
    pub extra: Value,
    pub is_full: bool,
    pub is_password_protected: bool,
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Parameter, die ein Client beim Verbindungsaufbau mitschickt
///
/// Query-Parameter kommen bei manchen Transporten als Strings an, deshalb
/// werden Flags und Zahlen tolerant ausgewertet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HandshakeQuery {
    pub userid: Option<String>,
    pub sessionid: Option<String>,
    pub extra: Option<Value>,
    pub msg_event: Option<String>,
    pub socket_custom_event: Option<String>,
    pub auto_close_entire_session: Option<Value>,
    pub max_participants_allowed: Option<Value>,
}

impl HandshakeQuery {
    /// Zusatzdaten als Objekt; JSON-Strings werden geparst, Unlesbares wird `{}`
    pub fn extra_wert(&self) -> Value {
        match &self.extra {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(Value::String(s)) => serde_json::from_str(s)
                .ok()
                .filter(|v: &Value| !v.is_null())
                .unwrap_or_else(|| Value::Object(Map::new())),
            Some(anderes) => anderes.clone(),
        }
    }

    /// `autoCloseEntireSession` als bool (`true` oder `"true"`)
    pub fn auto_close(&self) -> bool {
        match &self.auto_close_entire_session {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// `maxParticipantsAllowed` als Zahl >= 1, falls angegeben
    pub fn max_teilnehmer(&self) -> Option<usize> {
        let wert = match &self.max_participants_allowed {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        }?;
        usize::try_from(wert).ok().filter(|n| *n >= 1)
    }

    /// Nicht-leerer String-Parameter
    pub fn nicht_leer(wert: &Option<String>) -> Option<&str> {
        wert.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
