//! Handler fuer alle eingehenden Events
//!
//! Jeder Handler ist fuer ein Event zustaendig, bekommt die rohen Argumente
//! und hat Zugriff auf den gemeinsamen SignalingState. Erfolgreiche Handler
//! liefern die Completion-Argumente; Fehler wandelt der Router um.

pub mod relay_handler;
pub mod room_handler;
pub mod user_handler;

use serde::de::DeserializeOwned;
use serde_json::Value;
use signalhub_protocol::events;

use crate::directory::Entfernung;
use crate::error::{SignalingError, SignalingResult};
use crate::socket::SocketHandle;

/// Completion-Argumente; `None` wenn das Event keine Antwort hat
pub type Antwort = Option<Vec<Value>>;

/// Deserialisiert das Argument an Position `index`
pub(crate) fn argument<T: DeserializeOwned>(args: &[Value], index: usize) -> SignalingResult<T> {
    let wert = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(wert)
        .map_err(|e| SignalingError::parameter(format!("Argument {index}: {e}")))
}

/// String-Argument; Zahlen werden als Text akzeptiert, leere Strings zaehlen als fehlend
pub(crate) fn text_argument(args: &[Value], index: usize) -> Option<String> {
    let text = match args.get(index)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Passwort-Argument; unveraendert uebernommen, nur leer zaehlt als fehlend
pub(crate) fn passwort_argument(args: &[Value], index: usize) -> Option<String> {
    let text = match args.get(index)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Sendet ein Event und protokolliert ein Scheitern
pub(crate) fn senden(socket: &SocketHandle, event: &str, args: Vec<Value>) -> bool {
    let gesendet = socket.emit(event, args);
    if !gesendet {
        tracing::warn!(socket_id = %socket.id(), event, "Event konnte nicht zugestellt werden");
    }
    gesendet
}

/// Benachrichtigt einen neuen Raum-Besitzer
pub(crate) fn entfernung_melden(entfernung: &Entfernung) {
    if let Entfernung::BesitzUebertragen {
        room_id, socket, ..
    } = entfernung
    {
        senden(
            socket,
            events::SET_IS_INITIATOR_TRUE,
            vec![Value::String(room_id.0.clone())],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use signalhub_protocol::JoinRoomRequest;

    #[test]
    fn text_argument_varianten() {
        let args = vec![json!("  raum "), json!(42), json!(""), json!({"a": 1})];
        assert_eq!(text_argument(&args, 0).as_deref(), Some("raum"));
        assert_eq!(text_argument(&args, 1).as_deref(), Some("42"));
        assert_eq!(text_argument(&args, 2), None);
        assert_eq!(text_argument(&args, 3), None);
        assert_eq!(text_argument(&args, 9), None);
        assert_eq!(passwort_argument(&args, 0).as_deref(), Some("  raum "));
        assert_eq!(passwort_argument(&args, 2), None);
    }

    #[test]
    fn fehlendes_argument_ist_validierungsfehler() {
        let ergebnis: SignalingResult<JoinRoomRequest> = argument(&[], 0);
        assert!(matches!(ergebnis, Err(SignalingError::UngueltigeParameter(_))));
    }
}
