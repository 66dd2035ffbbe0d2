//! Benutzer-Handler – Zusatzdaten, Umbenennen, Paarung trennen, Custom-Events

use serde_json::{json, Map, Value};
use signalhub_core::UserId;
use signalhub_protocol::events;
use std::sync::Arc;

use super::{senden, text_argument, Antwort};
use crate::directory::EventArt;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// `extra-data-updated(extra)` – setzt die Zusatzdaten und verteilt sie
pub fn handle_extra_data_updated(
    args: &[Value],
    user_id: &UserId,
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let extra = match args.first() {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(wert) => wert.clone(),
    };

    let empfaenger = state.verzeichnis.extra_aktualisieren(user_id, extra.clone())?;
    for (_, socket) in &empfaenger {
        senden(
            socket,
            events::EXTRA_DATA_UPDATED,
            vec![json!(user_id), extra.clone()],
        );
    }

    tracing::debug!(user_id = %user_id, empfaenger = empfaenger.len(), "Zusatzdaten verteilt");
    Ok(Some(vec![json!(true)]))
}

/// `get-remote-user-extra-data(remoteUserId)`
pub fn handle_get_remote_user_extra_data(
    args: &[Value],
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let remote = text_argument(args, 0)
        .map(UserId::from)
        .ok_or_else(|| SignalingError::parameter("Benutzer-ID fehlt"))?;

    let extra = state
        .verzeichnis
        .extra_von(&remote)
        .ok_or_else(|| SignalingError::BenutzerNichtGefunden(remote.0.clone()))?;
    Ok(Some(vec![json!(true), extra]))
}

/// `changed-uuid(newUserId)`
pub fn handle_changed_uuid(
    args: &[Value],
    user_id: &UserId,
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let neu = text_argument(args, 0)
        .map(UserId::from)
        .ok_or_else(|| SignalingError::parameter("neue Benutzer-ID fehlt"))?;

    state.verzeichnis.benutzer_umbenennen(user_id, neu.clone())?;
    Ok(Some(vec![json!(true), json!(neu)]))
}

/// `disconnect-with(remoteUserId)` – nur die Gegenseite wird benachrichtigt
pub fn handle_disconnect_with(
    args: &[Value],
    user_id: &UserId,
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let remote = text_argument(args, 0)
        .map(UserId::from)
        .ok_or_else(|| SignalingError::parameter("Benutzer-ID fehlt"))?;

    if let Some(socket) = state.verzeichnis.paarung_trennen(user_id, &remote) {
        senden(&socket, events::USER_DISCONNECTED, vec![json!(user_id)]);
    }
    Ok(Some(vec![json!(true)]))
}

/// `set-custom-socket-event-listener(eventName)`
///
/// Wiederholte Registrierung desselben Namens ist ein No-op.
pub fn handle_set_custom_event_listener(
    args: &[Value],
    user_id: &UserId,
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let name = text_argument(args, 0)
        .ok_or_else(|| SignalingError::parameter("Event-Name fehlt"))?;
    let eigenes = state.verzeichnis.event_zuordnen(user_id, &name) == Some(EventArt::Nachricht);
    if events::ist_reserviert(&name) || eigenes {
        return Err(SignalingError::parameter(format!(
            "Event-Name {name} ist fest belegt"
        )));
    }

    let neu = state.verzeichnis.custom_event_registrieren(user_id, &name)?;
    if neu {
        tracing::debug!(user_id = %user_id, event = %name, "Custom-Event registriert");
    }
    Ok(Some(vec![json!(true), json!(neu)]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
