//! Raum-Handler – Oeffnen, Beitreten, Praesenz, Passwort, Schliessen
//!
//! Duenne Uebersetzung der Event-Argumente in Verzeichnis-Operationen.
//! Completions haben die Form `(success, daten|fehler)`.

use serde_json::{json, Value};
use signalhub_core::{RoomId, UserId};
use signalhub_protocol::{meldungen, JoinRoomRequest, OpenRoomRequest};
use std::sync::Arc;

use super::{argument, entfernung_melden, passwort_argument, text_argument, Antwort};
use crate::directory::{Entfernung, RaumOeffnen};
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// `open-room {sessionid?, session, extra?, identifier?, password?}`
pub fn handle_open_room(
    args: &[Value],
    user_id: &UserId,
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let req: OpenRoomRequest = argument(args, 0)?;
    let verzeichnis = &state.verzeichnis;

    let room_id = match req.sessionid.filter(|id| !id.ist_leer()) {
        Some(id) => id,
        None => verzeichnis
            .session_id_von(user_id)
            .ok_or_else(|| SignalingError::BenutzerNichtGefunden(user_id.0.clone()))?,
    };

    let mut anfrage = RaumOeffnen::neu(room_id.clone());
    anfrage.session = req.session;
    anfrage.identifier = req.identifier.unwrap_or_default();
    anfrage.password = req.password;
    if let Some(extra) = req.extra {
        anfrage.benutzer_extra = Some(extra.clone());
        anfrage.extra = extra;
    }

    if let Some(verlassen) = verzeichnis.raum_erstellen(user_id, anfrage)? {
        entfernung_melden(&verlassen);
    }

    Ok(Some(vec![json!(true), json!(room_id)]))
}

/// `join-room {sessionid, extra?, password?}`
pub fn handle_join_room(
    args: &[Value],
    user_id: &UserId,
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let req: JoinRoomRequest = argument(args, 0)?;

    let verlassen = state.verzeichnis.raum_beitreten(
        user_id,
        &req.sessionid,
        req.password.as_deref(),
        req.extra,
    )?;
    if let Some(verlassen) = verlassen {
        entfernung_melden(&verlassen);
    }

    Ok(Some(vec![json!(true), json!(req.sessionid)]))
}

/// `check-presence(roomId)` → `(existiert, roomId, extra)`
pub fn handle_check_presence(args: &[Value], state: &Arc<SignalingState>) -> SignalingResult<Antwort> {
    let room_id = text_argument(args, 0)
        .map(RoomId::from)
        .ok_or_else(|| SignalingError::parameter("Raum-ID fehlt"))?;

    let (vorhanden, extra) = state.verzeichnis.praesenz_pruefen(&room_id);
    Ok(Some(vec![json!(vorhanden), json!(room_id), extra]))
}

/// `get-public-rooms(identifier)`
pub fn handle_get_public_rooms(args: &[Value], state: &Arc<SignalingState>) -> SignalingResult<Antwort> {
    let Some(identifier) = text_argument(args, 0) else {
        return Ok(Some(vec![json!(false), json!(meldungen::PUBLIC_IDENTIFIER_MISSING)]));
    };

    let raeume = state.verzeichnis.oeffentliche_raeume(&identifier);
    let raeume = serde_json::to_value(raeume).map_err(|e| SignalingError::intern(e.to_string()))?;
    Ok(Some(vec![json!(true), raeume]))
}

/// `set-password(password)`, nur fuer den Raum-Besitzer
pub fn handle_set_password(
    args: &[Value],
    user_id: &UserId,
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let password = passwort_argument(args, 0);
    state.verzeichnis.passwort_setzen(user_id, password)?;
    let room_id = state.verzeichnis.raum_von(user_id);
    Ok(Some(vec![json!(true), json!(room_id)]))
}

/// `is-valid-password(password, roomId)` → `(gueltig, roomId, fehler|false)`
pub fn handle_is_valid_password(args: &[Value], state: &Arc<SignalingState>) -> SignalingResult<Antwort> {
    let password = passwort_argument(args, 0);
    let room_id = text_argument(args, 1);
    let abgelehnt = |room_id: &Option<String>, meldung: &str| -> SignalingResult<Antwort> {
        Ok(Some(vec![json!(false), json!(room_id), json!(meldung)]))
    };

    let Some(password) = password else {
        return abgelehnt(&room_id, meldungen::PASSWORD_MISSING);
    };
    let Some(raum) = room_id.clone() else {
        return abgelehnt(&room_id, meldungen::ROOM_ID_MISSING);
    };

    match state.verzeichnis.passwort_pruefen(&RoomId::from(raum), &password) {
        Ok(Some(true)) => Ok(Some(vec![json!(true), json!(room_id), json!(false)])),
        Ok(Some(false)) => abgelehnt(&room_id, meldungen::INVALID_PASSWORD),
        Ok(None) => abgelehnt(&room_id, meldungen::ROOM_HAS_NO_PASSWORD),
        Err(e) => abgelehnt(&room_id, e.client_meldung()),
    }
}

/// `close-entire-session()` – loescht den eigenen Raum statt ihn zu uebergeben
pub fn handle_close_entire_session(
    user_id: &UserId,
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let entfernung = state.verzeichnis.sitzung_schliessen(user_id)?;
    tracing::info!(user_id = %user_id, ergebnis = ?entfernung, "Sitzung geschlossen");
    match entfernung {
        Entfernung::RaumGeloescht { room_id } => Ok(Some(vec![json!(true), json!(room_id)])),
        _ => Ok(Some(vec![json!(true)])),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
