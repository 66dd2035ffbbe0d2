//! Signalhub – Einstiegspunkt fuer Transporte und Administration
//!
//! Der Hub nimmt neue Verbindungen an, reicht ihre Events an den
//! [`MessageRouter`] weiter und startet die Bereinigung wenn eine
//! Verbindung endet. Der Heartbeat meldet aufgegebene Verbindungen ueber
//! einen Hook, der dieselbe Bereinigung ausloest.
//!
//! ```text
//! Transport ──verbindung_annehmen──> Verzeichnis + Heartbeat
//!           ──event_verarbeiten────> MessageRouter ──> Handler
//!           ──verbindung_getrennt──> cleanup::verbindung_bereinigen
//! Heartbeat ──verloren_hook────────> cleanup::verbindung_bereinigen
//! ```

use serde::Serialize;
use serde_json::{json, Value};
use signalhub_core::{RoomId, SocketId, UserId};
use signalhub_protocol::{events, HandshakeQuery};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::cleanup::verbindung_bereinigen;
use crate::directory::{NeuerBenutzer, RoomInfo, UserInfo};
use crate::error::{SignalingError, SignalingResult};
use crate::handlers::senden;
use crate::heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatStatus};
use crate::router::MessageRouter;
use crate::server_state::{SignalingConfig, SignalingState, TrennCallback};
use crate::socket::SocketHandle;

/// Momentaufnahme fuer `getConnectionStats`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerbindungsStatistik {
    pub total_users: usize,
    pub total_rooms: usize,
    pub heartbeat_sockets: usize,
    pub heartbeat_running: bool,
    pub uptime_secs: u64,
}

/// Zentrale Fassade des Signalhub
#[derive(Clone)]
pub struct SignalingHub {
    state: Arc<SignalingState>,
    router: MessageRouter,
}

impl SignalingHub {
    /// Erstellt einen Hub und verbindet Heartbeat und Bereinigung
    pub fn neu(config: SignalingConfig) -> Self {
        let state = SignalingState::neu(config);

        let schwach = Arc::downgrade(&state);
        state.heartbeat.verloren_hook_setzen(Arc::new(move |socket: SocketHandle| {
            let Some(state) = schwach.upgrade() else {
                return;
            };
            let fehler = SignalingError::VerbindungVerloren(state.heartbeat.config().max_fehlversuche);
            tracing::info!(socket_id = %socket.id(), fehler = %fehler, "Bereinige aufgegebene Verbindung");
            verbindung_bereinigen(&state, socket.id());
        }));

        if state.config.heartbeat.aktiviert {
            state.heartbeat.starten(None);
        }

        let router = MessageRouter::neu(Arc::clone(&state));
        Self { state, router }
    }

    /// Setzt den Rueckruf, der nach jeder Bereinigung laeuft
    pub fn mit_trenn_callback(self, callback: TrennCallback) -> Self {
        *self.state.trenn_callback.write() = Some(callback);
        self
    }

    /// Gemeinsamer Zustand
    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }

    // -----------------------------------------------------------------------
    // Verbindungen
    // -----------------------------------------------------------------------

    /// Nimmt eine neue Verbindung an
    ///
    /// Ist die angefragte Benutzer-ID bereits vergeben, erhaelt der Socket
    /// `userid-already-taken(alt, neu)` mit einer frisch generierten ID und
    /// die Verbindung wird abgelehnt. Der Transport schliesst sie danach.
    pub fn verbindung_annehmen(
        &self,
        socket: SocketHandle,
        query: HandshakeQuery,
    ) -> SignalingResult<UserId> {
        let config = &self.state.config;

        let user_id = HandshakeQuery::nicht_leer(&query.userid)
            .map(UserId::from)
            .unwrap_or_else(UserId::generieren);
        let session_id = HandshakeQuery::nicht_leer(&query.sessionid)
            .map(RoomId::from)
            .unwrap_or_else(RoomId::generieren);

        let neu = NeuerBenutzer {
            user_id: user_id.clone(),
            socket: Arc::clone(&socket),
            extra: query.extra_wert(),
            message_event: HandshakeQuery::nicht_leer(&query.msg_event)
                .map(str::to_string)
                .unwrap_or_else(|| config.nachrichten_event.clone()),
            custom_event: HandshakeQuery::nicht_leer(&query.socket_custom_event).map(str::to_string),
            session_id,
            auto_close_entire_session: query.auto_close(),
            max_participants_allowed: query
                .max_teilnehmer()
                .unwrap_or(config.max_teilnehmer_standard),
        };

        if let Err(e) = self.state.verzeichnis.benutzer_registrieren(neu) {
            if matches!(e, SignalingError::UserIdVergeben(_)) {
                let vorschlag = UserId::generieren();
                senden(
                    &socket,
                    events::USERID_ALREADY_TAKEN,
                    vec![json!(user_id), json!(vorschlag)],
                );
            }
            tracing::info!(user_id = %user_id, socket_id = %socket.id(), fehler = %e, "Verbindung abgelehnt");
            return Err(e);
        }

        // Der Manager entscheidet anhand seiner aktuellen Konfiguration
        self.state.heartbeat.socket_hinzufuegen(Arc::clone(&socket));

        tracing::info!(user_id = %user_id, socket_id = %socket.id(), "Benutzer verbunden");
        Ok(user_id)
    }

    /// Verarbeitet ein eingehendes Event; liefert die Completion
    pub fn event_verarbeiten(&self, socket_id: &SocketId, event: &str, args: &[Value]) -> Option<Vec<Value>> {
        self.router.dispatch(socket_id, event, args)
    }

    /// Der Transport meldet das Ende einer Verbindung
    pub fn verbindung_getrennt(&self, socket_id: &SocketId) {
        verbindung_bereinigen(&self.state, socket_id);
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Alle Raeume
    pub fn raeume(&self) -> Vec<RoomInfo> {
        self.state.verzeichnis.raum_liste()
    }

    /// Alle Benutzer
    pub fn benutzer(&self) -> Vec<UserInfo> {
        self.state.verzeichnis.benutzer_liste()
    }

    pub fn raum(&self, room_id: &RoomId) -> Option<RoomInfo> {
        self.state.verzeichnis.raum_info(room_id)
    }

    pub fn benutzer_info(&self, user_id: &UserId) -> Option<UserInfo> {
        self.state.verzeichnis.benutzer_info(user_id)
    }

    /// Wirft einen Benutzer hinaus: `kicked{reason}`, dann Trennung
    pub fn benutzer_kicken(&self, user_id: &UserId, grund: Option<&str>) -> SignalingResult<()> {
        let socket = self
            .state
            .verzeichnis
            .socket_von(user_id)
            .ok_or_else(|| SignalingError::BenutzerNichtGefunden(user_id.0.clone()))?;

        senden(&socket, events::KICKED, vec![json!({ "reason": grund })]);
        socket.disconnect();
        verbindung_bereinigen(&self.state, socket.id());

        tracing::info!(user_id = %user_id, grund = grund.unwrap_or(""), "Benutzer gekickt");
        Ok(())
    }

    /// Schliesst einen Raum und trennt alle Teilnehmer
    ///
    /// Der Raum wird zuerst entfernt, damit die Bereinigung der Teilnehmer
    /// keinen Besitzerwechsel mehr ausloest.
    pub fn raum_schliessen(&self, room_id: &RoomId) -> SignalingResult<usize> {
        let teilnehmer = self
            .state
            .verzeichnis
            .raum_loeschen(room_id)
            .ok_or_else(|| SignalingError::RaumNichtVerfuegbar(room_id.0.clone()))?;

        for (_, socket) in &teilnehmer {
            senden(socket, events::ROOM_CLOSED, vec![json!(room_id)]);
            socket.disconnect();
            verbindung_bereinigen(&self.state, socket.id());
        }

        tracing::info!(room_id = %room_id, teilnehmer = teilnehmer.len(), "Raum geschlossen");
        Ok(teilnehmer.len())
    }

    /// Zaehler fuer Monitoring
    pub fn verbindungs_statistik(&self) -> VerbindungsStatistik {
        VerbindungsStatistik {
            total_users: self.state.verzeichnis.anzahl_benutzer(),
            total_rooms: self.state.verzeichnis.anzahl_raeume(),
            heartbeat_sockets: self.state.heartbeat.anzahl(),
            heartbeat_running: self.state.heartbeat.laeuft(),
            uptime_secs: self.state.uptime_sek(),
        }
    }

    pub fn heartbeat_status(&self) -> Vec<HeartbeatStatus> {
        self.state.heartbeat.status()
    }

    pub fn heartbeat_events(&self) -> broadcast::Receiver<HeartbeatEvent> {
        self.state.heartbeat.events_abonnieren()
    }

    pub fn heartbeat_stoppen(&self) {
        self.state.heartbeat.stoppen();
    }

    /// Startet den Heartbeat neu und nimmt alle lebenden Sockets wieder auf
    pub fn heartbeat_neustarten(&self, config: Option<HeartbeatConfig>) {
        self.state.heartbeat.stoppen();
        self.state.heartbeat.starten(config);
        let sockets = self.state.verzeichnis.alle_sockets();
        for socket in &sockets {
            self.state.heartbeat.socket_hinzufuegen(Arc::clone(socket));
        }
        tracing::info!(sockets = sockets.len(), "Heartbeat neu gestartet");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::{AusgehendesEvent, ChannelSocket, SignalingSocket};
    use tokio::sync::mpsc;

    fn hub() -> SignalingHub {
        let mut config = SignalingConfig::default();
        config.heartbeat.aktiviert = false;
        SignalingHub::neu(config)
    }

    fn verbinden(
        hub: &SignalingHub,
        socket_id: &str,
        query: Value,
    ) -> (SignalingResult<UserId>, Arc<ChannelSocket>, mpsc::Receiver<AusgehendesEvent>) {
        let (socket, rx) = ChannelSocket::neu(SocketId::from(socket_id));
        let query: HandshakeQuery = serde_json::from_value(query).unwrap();
        let ergebnis = hub.verbindung_annehmen(socket.clone(), query);
        (ergebnis, socket, rx)
    }

    #[test]
    fn ids_werden_generiert() {
        let hub = hub();
        let (ergebnis, _s, _rx) = verbinden(&hub, "s1", json!({}));
        let user_id = ergebnis.unwrap();
        assert_eq!(user_id.as_str().len(), 32);
        let info = hub.benutzer_info(&user_id).unwrap();
        assert_eq!(info.socket_message_event, "RTCMultiConnection-Message");
    }

    #[test]
    fn doppelte_id_wird_abgelehnt() {
        let hub = hub();
        let (erst, _s1, _rx1) = verbinden(&hub, "s1", json!({"userid": "alice"}));
        erst.unwrap();

        let (zweit, _s2, mut rx2) = verbinden(&hub, "s2", json!({"userid": "alice"}));
        assert!(matches!(zweit, Err(SignalingError::UserIdVergeben(_))));

        let ev = rx2.try_recv().expect("userid-already-taken erwartet");
        assert_eq!(ev.name, "userid-already-taken");
        assert_eq!(ev.args[0], json!("alice"));
        assert_ne!(ev.args[1], json!("alice"));
        assert_eq!(hub.verbindungs_statistik().total_users, 1);
    }

    #[test]
    fn kick_trennt_und_bereinigt() {
        let hub = hub();
        let (ergebnis, socket, mut rx) = verbinden(&hub, "s1", json!({"userid": "bob"}));
        let bob = ergebnis.unwrap();

        hub.benutzer_kicken(&bob, Some("Spam")).unwrap();

        let ev = rx.try_recv().expect("kicked erwartet");
        assert_eq!(ev.name, "kicked");
        assert_eq!(ev.args, vec![json!({"reason": "Spam"})]);
        assert!(socket.ist_getrennt());
        assert!(hub.benutzer_info(&bob).is_none());
        assert!(hub.benutzer_kicken(&bob, None).is_err());
    }

    #[test]
    fn raum_schliessen_trennt_alle() {
        let hub = hub();
        let (_, s1, mut rx1) = verbinden(&hub, "s1", json!({"userid": "u1"}));
        let (_, s2, mut rx2) = verbinden(&hub, "s2", json!({"userid": "u2"}));
        hub.event_verarbeiten(s1.id(), "open-room", &[json!({"sessionid": "r1"})]);
        hub.event_verarbeiten(s2.id(), "join-room", &[json!({"sessionid": "r1"})]);

        assert_eq!(hub.raum_schliessen(&RoomId::from("r1")).unwrap(), 2);

        for rx in [&mut rx1, &mut rx2] {
            let ev = rx.try_recv().expect("room-closed erwartet");
            assert_eq!(ev.name, "room-closed");
            assert_eq!(ev.args, vec![json!("r1")]);
            assert!(rx.try_recv().is_err());
        }
        assert!(hub.raum(&RoomId::from("r1")).is_none());
        assert_eq!(hub.verbindungs_statistik().total_users, 0);
        assert!(hub.raum_schliessen(&RoomId::from("r1")).is_err());
    }

    #[test]
    fn handshake_parameter_werden_uebernommen() {
        let hub = hub();
        let (ergebnis, _s, _rx) = verbinden(
            &hub,
            "s1",
            json!({
                "userid": "u1",
                "sessionid": "meine-session",
                "extra": "{\"name\":\"Eins\"}",
                "msgEvent": "signal",
                "maxParticipantsAllowed": "3"
            }),
        );
        let u1 = ergebnis.unwrap();
        let info = hub.benutzer_info(&u1).unwrap();
        assert_eq!(info.extra, json!({"name": "Eins"}));
        assert_eq!(info.socket_message_event, "signal");

        hub.event_verarbeiten(&SocketId::from("s1"), "open-room", &[json!({})]);
        let raum = hub.raum(&RoomId::from("meine-session")).unwrap();
        assert_eq!(raum.max_participants_allowed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn neustart_aktiviert_ueberwachung_neuer_verbindungen() {
        let hub = hub();
        let (_, _s0, _rx0) = verbinden(&hub, "s0", json!({"userid": "u0"}));
        assert_eq!(hub.verbindungs_statistik().heartbeat_sockets, 0);

        hub.heartbeat_neustarten(Some(HeartbeatConfig::default()));
        assert!(hub.verbindungs_statistik().heartbeat_running);
        assert_eq!(hub.verbindungs_statistik().heartbeat_sockets, 1);

        let (ergebnis, _s1, _rx1) = verbinden(&hub, "s1", json!({"userid": "u1"}));
        ergebnis.unwrap();
        let status = hub.heartbeat_status();
        assert_eq!(status.len(), 2);
        hub.heartbeat_stoppen();
    }
}
