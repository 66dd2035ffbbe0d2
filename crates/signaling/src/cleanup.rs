//! Bereinigung nach dem Ende einer Verbindung
//!
//! Die Schritte laufen in fester Reihenfolge. Jeder Schritt arbeitet nur auf
//! dem Verzeichnis oder sendet best-effort; ein gescheiterter Versand bricht
//! die folgenden Schritte nicht ab.
//!
//! Die Bereinigung laeuft pro Socket genau einmal. Ob sie vom Transport
//! (Verbindung geschlossen), vom Heartbeat (Verbindung verloren) oder von
//! einer Admin-Operation ausgeloest wird, spielt keine Rolle: nur der erste
//! Aufruf beansprucht den Benutzer, alle weiteren sind No-ops.

use serde_json::json;
use signalhub_core::SocketId;
use signalhub_protocol::events;
use std::sync::Arc;

use crate::handlers::{entfernung_melden, senden};
use crate::server_state::SignalingState;

/// Bereinigt eine Verbindung; liefert `false` wenn nichts zu tun war
pub fn verbindung_bereinigen(state: &Arc<SignalingState>, socket_id: &SocketId) -> bool {
    // 1. Heartbeat
    if state.heartbeat.socket_entfernen(socket_id) {
        tracing::debug!(socket_id = %socket_id, "Heartbeat abgemeldet");
    }

    let Some((user_id, socket)) = state.verzeichnis.abmeldung_beanspruchen(socket_id) else {
        tracing::debug!(socket_id = %socket_id, "Verbindung bereits bereinigt");
        return false;
    };

    // 2. Transport
    socket.abmelden();

    // 3. Paarungen
    let peers = state.verzeichnis.paarungen_aufloesen(&user_id);
    for (_, peer_socket) in &peers {
        senden(peer_socket, events::USER_DISCONNECTED, vec![json!(user_id)]);
    }

    // 4. Raum
    let entfernung = state.verzeichnis.raum_verlassen(&user_id, false);
    entfernung_melden(&entfernung);

    // 5. Benutzer
    if !state.verzeichnis.benutzer_entfernen(&user_id, socket_id) {
        tracing::warn!(user_id = %user_id, "Benutzer-Datensatz nicht mehr vorhanden");
    }

    // 6. Rueckruf
    let callback = state.trenn_callback.read().clone();
    if let Some(callback) = callback {
        callback(&user_id);
    }

    tracing::info!(
        user_id = %user_id,
        socket_id = %socket_id,
        peers = peers.len(),
        raum = ?entfernung,
        "Verbindung bereinigt"
    );
    true
}
