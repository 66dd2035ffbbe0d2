//! Message-Router – Routet eingehende Events an die richtigen Handler
//!
//! Feste Event-Namen werden ueber eine statische Tabelle aufgeloest. Danach
//! wird geprueft, ob der Name das ausgehandelte Signaling-Event oder ein
//! registriertes Custom-Event des Benutzers ist. Unbekannte Events werden
//! protokolliert und ignoriert.
//!
//! Fehler eines Handlers verlassen den Router nie; sie werden zur
//! Completion `(false, meldung)`.

use serde_json::{json, Value};
use signalhub_core::{SocketId, UserId};
use signalhub_protocol::events;
use std::sync::Arc;

use crate::directory::EventArt;
use crate::error::{FehlerKategorie, SignalingResult};
use crate::handlers::{relay_handler, room_handler, senden, user_handler, Antwort};
use crate::server_state::SignalingState;

/// Zentraler Event-Router
#[derive(Clone)]
pub struct MessageRouter {
    state: Arc<SignalingState>,
}

impl MessageRouter {
    /// Erstellt einen neuen Router
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein eingehendes Event und gibt die Completion zurueck
    ///
    /// Gibt `None` zurueck wenn das Event keine Antwort hat.
    pub fn dispatch(&self, socket_id: &SocketId, event: &str, args: &[Value]) -> Antwort {
        // Keepalive braucht keinen Benutzer
        match event {
            events::PONG => {
                self.state.heartbeat.pong_empfangen(socket_id);
                return None;
            }
            events::PING => {
                if let Some(socket) = self
                    .state
                    .verzeichnis
                    .user_von_socket(socket_id)
                    .and_then(|u| self.state.verzeichnis.socket_von(&u))
                {
                    senden(&socket, events::PONG, args.to_vec());
                }
                return None;
            }
            _ => {}
        }

        let Some(user_id) = self.state.verzeichnis.user_von_socket(socket_id) else {
            tracing::debug!(socket_id = %socket_id, event, "Event ohne lebenden Benutzer ignoriert");
            return None;
        };

        match self.handler_ausfuehren(event, args, &user_id) {
            Ok(antwort) => antwort,
            Err(e) => {
                match e.kategorie() {
                    FehlerKategorie::Validierung | FehlerKategorie::Konflikt | FehlerKategorie::NichtGefunden => {
                        tracing::debug!(user_id = %user_id, event, fehler = %e, "Anfrage abgelehnt")
                    }
                    FehlerKategorie::Transport | FehlerKategorie::Lebendigkeit => {
                        tracing::warn!(user_id = %user_id, event, fehler = %e, "Handler fehlgeschlagen")
                    }
                }
                Some(vec![json!(false), json!(e.client_meldung())])
            }
        }
    }

    fn handler_ausfuehren(
        &self,
        event: &str,
        args: &[Value],
        user_id: &UserId,
    ) -> SignalingResult<Antwort> {
        let state = &self.state;
        match event {
            // -------------------------------------------------------------------
            // Raeume
            // -------------------------------------------------------------------
            events::OPEN_ROOM => room_handler::handle_open_room(args, user_id, state),
            events::JOIN_ROOM => room_handler::handle_join_room(args, user_id, state),
            events::CHECK_PRESENCE => room_handler::handle_check_presence(args, state),
            events::GET_PUBLIC_ROOMS => room_handler::handle_get_public_rooms(args, state),
            events::SET_PASSWORD => room_handler::handle_set_password(args, user_id, state),
            events::IS_VALID_PASSWORD => room_handler::handle_is_valid_password(args, state),
            events::CLOSE_ENTIRE_SESSION => room_handler::handle_close_entire_session(user_id, state),

            // -------------------------------------------------------------------
            // Benutzer
            // -------------------------------------------------------------------
            events::EXTRA_DATA_UPDATED => user_handler::handle_extra_data_updated(args, user_id, state),
            events::GET_REMOTE_USER_EXTRA_DATA => {
                user_handler::handle_get_remote_user_extra_data(args, state)
            }
            events::CHANGED_UUID => user_handler::handle_changed_uuid(args, user_id, state),
            events::DISCONNECT_WITH => user_handler::handle_disconnect_with(args, user_id, state),
            events::SET_CUSTOM_SOCKET_EVENT_LISTENER => {
                user_handler::handle_set_custom_event_listener(args, user_id, state)
            }

            // -------------------------------------------------------------------
            // Ausgehandelte Events
            // -------------------------------------------------------------------
            name => match state.verzeichnis.event_zuordnen(user_id, name) {
                Some(EventArt::Nachricht) => relay_handler::handle_nachricht(args, user_id, state),
                Some(EventArt::Custom) => relay_handler::handle_custom_event(name, args, user_id, state),
                None => {
                    tracing::warn!(user_id = %user_id, event = name, "Unbekanntes Event ignoriert");
                    Ok(None)
                }
            },
        }
    }
}
