//! Relay-Handler – Signaling-Nachrichten und Custom-Events weiterleiten
//!
//! Eine Signaling-Nachricht hat die Form
//! `{sender, remoteUserId, message, extra?}`. Je nach Ziel wird sie
//!
//! - als Praesenz-Anfrage beantwortet (`remoteUserId == "system"`),
//! - als Beitrittsanfrage an einen Raum verteilt (`message.newParticipationRequest`),
//! - oder an genau einen gepaarten Benutzer weitergeleitet.
//!
//! Beim Erstkontakt zweier Benutzer erhalten beide Seiten genau einmal
//! `user-connected` mit der ID der Gegenseite.

use serde_json::{json, Map, Value};
use signalhub_core::{RoomId, UserId};
use signalhub_protocol::{events, SYSTEM_ZIEL};
use std::sync::Arc;

use super::{senden, Antwort};
use crate::directory::{Paarung, RoomDirectory};
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// Generisches Signaling-Event
pub fn handle_nachricht(
    args: &[Value],
    user_id: &UserId,
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let mut nachricht = match args.first() {
        Some(Value::Object(obj)) => obj.clone(),
        _ => return Err(SignalingError::parameter("Signaling-Nachricht ist kein Objekt")),
    };
    nachricht.insert("sender".into(), json!(user_id));

    let remote = match nachricht.get("remoteUserId") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            tracing::debug!(user_id = %user_id, "Nachricht ohne Ziel verworfen");
            return Ok(None);
        }
    };
    if remote == user_id.as_str() {
        tracing::debug!(user_id = %user_id, "Nachricht an sich selbst verworfen");
        return Ok(None);
    }

    let verzeichnis = &state.verzeichnis;

    if remote == SYSTEM_ZIEL {
        return Ok(praesenz_anfrage(&nachricht, user_id, verzeichnis));
    }

    let beitritt = flag(&nachricht, "newParticipationRequest");
    let raum = RoomId::from(remote.as_str());
    if beitritt && verzeichnis.ist_raum(&raum) {
        raum_einfuehrung(nachricht, user_id, &raum, verzeichnis);
        return Ok(None);
    }

    let ziel = UserId::from(remote);
    if !verzeichnis.ist_live(&ziel) {
        tracing::debug!(user_id = %user_id, ziel = %ziel, "Ziel unbekannt");
        if let Some(socket) = verzeichnis.socket_von(user_id) {
            senden(&socket, events::USER_NOT_FOUND, vec![json!(ziel)]);
        }
        return Ok(None);
    }

    punkt_zu_punkt(nachricht, user_id, &ziel, verzeichnis)?;
    Ok(None)
}

/// Registriertes Custom-Event an alle anderen Benutzer verteilen
pub fn handle_custom_event(
    name: &str,
    args: &[Value],
    user_id: &UserId,
    state: &Arc<SignalingState>,
) -> SignalingResult<Antwort> {
    let empfaenger = state.verzeichnis.custom_event_empfaenger(user_id);
    for socket in &empfaenger {
        senden(socket, name, args.to_vec());
    }
    tracing::debug!(
        user_id = %user_id,
        event = name,
        empfaenger = empfaenger.len(),
        "Custom-Event verteilt"
    );
    Ok(None)
}

// ---------------------------------------------------------------------------
// Interne Schritte
// ---------------------------------------------------------------------------

/// Bool-Flag unterhalb von `message`
fn flag(nachricht: &Map<String, Value>, name: &str) -> bool {
    nachricht
        .get("message")
        .and_then(|m| m.get(name))
        .is_some_and(|v| match v {
            Value::Bool(b) => *b,
            Value::Null => false,
            _ => true,
        })
}

/// `detectPresence` an `system`: antwortet ob `message.userid` verbunden ist
fn praesenz_anfrage(
    nachricht: &Map<String, Value>,
    user_id: &UserId,
    verzeichnis: &RoomDirectory,
) -> Antwort {
    if !flag(nachricht, "detectPresence") {
        tracing::debug!(user_id = %user_id, "System-Nachricht ohne detectPresence verworfen");
        return None;
    }

    let gesucht = nachricht
        .get("message")
        .and_then(|m| m.get("userid"))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default();

    let vorhanden = !gesucht.is_empty()
        && gesucht != user_id.as_str()
        && verzeichnis.ist_live(&UserId::from(gesucht.as_str()));
    Some(vec![json!(vorhanden), json!(gesucht)])
}

/// Stellt zwei Benutzer einander vor, falls sie noch nicht gepaart sind
fn vorstellen(a: &UserId, b: &UserId, verzeichnis: &RoomDirectory) {
    if let Paarung::Neu { socket_a, socket_b } = verzeichnis.paaren(a, b) {
        senden(&socket_a, events::USER_CONNECTED, vec![json!(b)]);
        senden(&socket_b, events::USER_CONNECTED, vec![json!(a)]);
    }
}

fn punkt_zu_punkt(
    mut nachricht: Map<String, Value>,
    sender: &UserId,
    ziel: &UserId,
    verzeichnis: &RoomDirectory,
) -> SignalingResult<()> {
    if !flag(&nachricht, "userLeft") {
        vorstellen(sender, ziel, verzeichnis);
    }

    let Some(relay) = verzeichnis.relay_ziel(sender, ziel) else {
        tracing::debug!(sender = %sender, ziel = %ziel, "Nicht gepaart, Nachricht verworfen");
        return Ok(());
    };
    nachricht.insert("extra".into(), relay.sender_extra);
    if !senden(&relay.socket, &relay.message_event, vec![Value::Object(nachricht)]) {
        return Err(SignalingError::SendFehler(ziel.0.clone()));
    }
    Ok(())
}

fn raum_einfuehrung(
    nachricht: Map<String, Value>,
    joiner: &UserId,
    room_id: &RoomId,
    verzeichnis: &RoomDirectory,
) {
    let Some(einfuehrung) = verzeichnis.raum_einfuehrung(joiner, room_id) else {
        return;
    };

    for teilnehmer in &einfuehrung.teilnehmer {
        vorstellen(joiner, teilnehmer, verzeichnis);
    }

    let empfaenger: Vec<&UserId> = if einfuehrung.einweg {
        if einfuehrung.owner == *joiner {
            Vec::new()
        } else {
            vec![&einfuehrung.owner]
        }
    } else {
        einfuehrung.teilnehmer.iter().collect()
    };

    for ziel in empfaenger {
        let Some(relay) = verzeichnis.relay_ziel(joiner, ziel) else {
            continue;
        };
        let mut kopie = nachricht.clone();
        kopie.insert("remoteUserId".into(), json!(ziel));
        kopie.insert("extra".into(), relay.sender_extra);
        senden(&relay.socket, &relay.message_event, vec![Value::Object(kopie)]);
    }

    tracing::debug!(
        user_id = %joiner,
        room_id = %room_id,
        teilnehmer = einfuehrung.teilnehmer.len(),
        "Beitrittsanfrage verteilt"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{NeuerBenutzer, RaumOeffnen};
    use crate::server_state::SignalingConfig;
    use crate::socket::{AusgehendesEvent, ChannelSocket};
    use signalhub_core::SocketId;
    use signalhub_protocol::SessionFlags;
    use tokio::sync::mpsc;

    const NACHRICHT: &str = "RTCMultiConnection-Message";

    fn anmelden(state: &Arc<SignalingState>, id: &str) -> mpsc::Receiver<AusgehendesEvent> {
        let (socket, rx) = ChannelSocket::neu(SocketId::from(id));
        state
            .verzeichnis
            .benutzer_registrieren(NeuerBenutzer {
                user_id: UserId::from(id),
                socket,
                extra: json!({"name": id}),
                message_event: NACHRICHT.into(),
                custom_event: None,
                session_id: RoomId::from(id),
                auto_close_entire_session: false,
                max_participants_allowed: 10,
            })
            .unwrap();
        rx
    }

    fn alle(rx: &mut mpsc::Receiver<AusgehendesEvent>) -> Vec<AusgehendesEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[test]
    fn erstkontakt_stellt_genau_einmal_vor() {
        let state = SignalingState::neu(SignalingConfig::default());
        let mut rx1 = anmelden(&state, "u1");
        let mut rx2 = anmelden(&state, "u2");
        let u1 = UserId::from("u1");

        let msg = json!({"remoteUserId": "u2", "message": {"sdp": "x"}});
        handle_nachricht(&[msg.clone()], &u1, &state).unwrap();
        handle_nachricht(&[msg], &u1, &state).unwrap();

        let bei_u1 = alle(&mut rx1);
        assert_eq!(bei_u1.len(), 1);
        assert_eq!(bei_u1[0].name, "user-connected");
        assert_eq!(bei_u1[0].args, vec![json!("u2")]);

        let bei_u2 = alle(&mut rx2);
        let vorgestellt = bei_u2.iter().filter(|e| e.name == "user-connected").count();
        let nachrichten: Vec<_> = bei_u2.iter().filter(|e| e.name == NACHRICHT).collect();
        assert_eq!(vorgestellt, 1);
        assert_eq!(nachrichten.len(), 2);
        assert_eq!(nachrichten[0].args[0]["sender"], "u1");
        assert_eq!(nachrichten[0].args[0]["extra"]["name"], "u1");
        assert_eq!(nachrichten[0].args[0]["message"]["sdp"], "x");
    }

    #[test]
    fn sender_wird_ueberschrieben() {
        let state = SignalingState::neu(SignalingConfig::default());
        let _rx1 = anmelden(&state, "u1");
        let mut rx2 = anmelden(&state, "u2");

        let msg = json!({"sender": "gefaelscht", "remoteUserId": "u2", "message": {}});
        handle_nachricht(&[msg], &UserId::from("u1"), &state).unwrap();

        let weitergeleitet = alle(&mut rx2)
            .into_iter()
            .find(|e| e.name == NACHRICHT)
            .expect("Weiterleitung erwartet");
        assert_eq!(weitergeleitet.args[0]["sender"], "u1");
    }

    #[test]
    fn unbekanntes_ziel_meldet_user_not_found() {
        let state = SignalingState::neu(SignalingConfig::default());
        let mut rx1 = anmelden(&state, "u1");

        let msg = json!({"remoteUserId": "nonexistent", "message": {}});
        handle_nachricht(&[msg], &UserId::from("u1"), &state).unwrap();

        let events = alle(&mut rx1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "user-not-found");
        assert_eq!(events[0].args, vec![json!("nonexistent")]);
    }

    #[test]
    fn nachricht_an_sich_selbst_verworfen() {
        let state = SignalingState::neu(SignalingConfig::default());
        let mut rx1 = anmelden(&state, "u1");

        handle_nachricht(&[json!({"remoteUserId": "u1"})], &UserId::from("u1"), &state).unwrap();
        handle_nachricht(&[json!({"remoteUserId": ""})], &UserId::from("u1"), &state).unwrap();
        assert!(alle(&mut rx1).is_empty());
    }

    #[test]
    fn user_left_erzeugt_keine_paarung() {
        let state = SignalingState::neu(SignalingConfig::default());
        let _rx1 = anmelden(&state, "u1");
        let mut rx2 = anmelden(&state, "u2");

        let msg = json!({"remoteUserId": "u2", "message": {"userLeft": true}});
        handle_nachricht(&[msg], &UserId::from("u1"), &state).unwrap();

        assert!(alle(&mut rx2).is_empty());
        assert!(state
            .verzeichnis
            .relay_ziel(&UserId::from("u1"), &UserId::from("u2"))
            .is_none());
    }

    #[test]
    fn praesenz_anfrage_an_system() {
        let state = SignalingState::neu(SignalingConfig::default());
        let _rx1 = anmelden(&state, "u1");
        let _rx2 = anmelden(&state, "u2");
        let u1 = UserId::from("u1");

        let frage = |gesucht: &str| {
            let msg = json!({
                "remoteUserId": "system",
                "message": {"detectPresence": true, "userid": gesucht}
            });
            handle_nachricht(&[msg], &u1, &state).unwrap().unwrap()
        };

        assert_eq!(frage("u2"), vec![json!(true), json!("u2")]);
        assert_eq!(frage("u1"), vec![json!(false), json!("u1")]);
        assert_eq!(frage("u9"), vec![json!(false), json!("u9")]);
    }

    #[test]
    fn beitrittsanfrage_an_alle_teilnehmer() {
        let state = SignalingState::neu(SignalingConfig::default());
        let mut rx1 = anmelden(&state, "u1");
        let mut rx2 = anmelden(&state, "u2");
        let mut rx3 = anmelden(&state, "u3");
        let v = &state.verzeichnis;
        v.raum_erstellen(&UserId::from("u1"), RaumOeffnen::neu(RoomId::from("r1")))
            .unwrap();
        v.raum_beitreten(&UserId::from("u2"), &RoomId::from("r1"), None, None)
            .unwrap();
        v.raum_beitreten(&UserId::from("u3"), &RoomId::from("r1"), None, None)
            .unwrap();

        let msg = json!({"remoteUserId": "r1", "message": {"newParticipationRequest": true}});
        handle_nachricht(&[msg], &UserId::from("u3"), &state).unwrap();

        for (rx, id) in [(&mut rx1, "u1"), (&mut rx2, "u2")] {
            let events = alle(rx);
            assert_eq!(events[0].name, "user-connected");
            assert_eq!(events[0].args, vec![json!("u3")]);
            let anfrage = events
                .iter()
                .find(|e| e.name == NACHRICHT)
                .expect("Beitrittsanfrage erwartet");
            assert_eq!(anfrage.args[0]["remoteUserId"], id);
        }
        let bei_u3 = alle(&mut rx3);
        assert_eq!(bei_u3.iter().filter(|e| e.name == "user-connected").count(), 2);
    }

    #[test]
    fn beitrittsanfrage_einweg_nur_an_besitzer() {
        let state = SignalingState::neu(SignalingConfig::default());
        let mut rx1 = anmelden(&state, "u1");
        let mut rx2 = anmelden(&state, "u2");
        let _rx3 = anmelden(&state, "u3");
        let v = &state.verzeichnis;
        let mut anfrage = RaumOeffnen::neu(RoomId::from("r1"));
        anfrage.session = SessionFlags {
            broadcast: true,
            ..Default::default()
        };
        v.raum_erstellen(&UserId::from("u1"), anfrage).unwrap();
        v.raum_beitreten(&UserId::from("u2"), &RoomId::from("r1"), None, None)
            .unwrap();
        v.raum_beitreten(&UserId::from("u3"), &RoomId::from("r1"), None, None)
            .unwrap();

        let msg = json!({"remoteUserId": "r1", "message": {"newParticipationRequest": true}});
        handle_nachricht(&[msg], &UserId::from("u3"), &state).unwrap();

        assert!(alle(&mut rx1).iter().any(|e| e.name == NACHRICHT));
        assert!(!alle(&mut rx2).iter().any(|e| e.name == NACHRICHT));
    }

    #[test]
    fn custom_event_an_alle_anderen() {
        let state = SignalingState::neu(SignalingConfig::default());
        let mut rx1 = anmelden(&state, "u1");
        let mut rx2 = anmelden(&state, "u2");
        let mut rx3 = anmelden(&state, "u3");

        handle_custom_event("chat", &[json!("hallo")], &UserId::from("u1"), &state).unwrap();

        assert!(alle(&mut rx1).is_empty());
        for rx in [&mut rx2, &mut rx3] {
            let events = alle(rx);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].name, "chat");
            assert_eq!(events[0].args, vec![json!("hallo")]);
        }
    }
}
