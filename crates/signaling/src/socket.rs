//! Transport-Socket-Vertrag
//!
//! Der Kern kennt Verbindungen nur ueber [`SignalingSocket`]. Ein Transport
//! (hier: der TCP-Adapter) stellt die Implementierung bereit und besitzt den
//! Lebenszyklus der Verbindung; Verzeichnis und Heartbeat halten nur
//! geteilte Handles.
//!
//! [`ChannelSocket`] ist die Standard-Implementierung: ausgehende Events
//! landen in einer begrenzten mpsc-Queue, die der Verbindungs-Task leert.

use serde_json::Value;
use signalhub_core::SocketId;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// Vertrag
// ---------------------------------------------------------------------------

/// Faehigkeiten, die jeder Transport bereitstellen muss
pub trait SignalingSocket: Send + Sync {
    /// Transport-interne ID der Verbindung
    fn id(&self) -> &SocketId;

    /// Sendet ein Event nicht-blockierend
    ///
    /// Gibt `false` zurueck wenn das Senden nicht moeglich ist.
    fn emit(&self, event: &str, args: Vec<Value>) -> bool;

    /// Erzwingt das Schliessen der Verbindung
    fn disconnect(&self);

    /// Transport-eigene Buchhaltung beim Abmelden
    fn abmelden(&self) {}
}

/// Geteiltes, nicht-besitzendes Handle auf eine Verbindung
pub type SocketHandle = Arc<dyn SignalingSocket>;

// ---------------------------------------------------------------------------
// ChannelSocket
// ---------------------------------------------------------------------------

/// Ein ausgehendes Event in der Send-Queue
#[derive(Debug, Clone, PartialEq)]
pub struct AusgehendesEvent {
    pub name: String,
    pub args: Vec<Value>,
}

/// Socket auf Basis einer mpsc-Queue und eines Trenn-Signals
pub struct ChannelSocket {
    id: SocketId,
    tx: mpsc::Sender<AusgehendesEvent>,
    getrennt: watch::Sender<bool>,
}

impl ChannelSocket {
    /// Erstellt einen Socket und gibt die Empfangsseite seiner Send-Queue zurueck
    pub fn neu(id: SocketId) -> (Arc<Self>, mpsc::Receiver<AusgehendesEvent>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let (getrennt, _) = watch::channel(false);
        (Arc::new(Self { id, tx, getrennt }), rx)
    }

    /// Empfaenger, der auf `true` wechselt sobald `disconnect` aufgerufen wurde
    pub fn trenn_signal(&self) -> watch::Receiver<bool> {
        self.getrennt.subscribe()
    }

    /// Wurde die Verbindung bereits zum Schliessen markiert?
    pub fn ist_getrennt(&self) -> bool {
        *self.getrennt.borrow()
    }
}

impl SignalingSocket for ChannelSocket {
    fn id(&self) -> &SocketId {
        &self.id
    }

    fn emit(&self, event: &str, args: Vec<Value>) -> bool {
        if self.ist_getrennt() {
            return false;
        }
        let nachricht = AusgehendesEvent {
            name: event.to_string(),
            args,
        };
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(socket_id = %self.id, event, "Send-Queue voll – Event verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(socket_id = %self.id, event, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }

    fn disconnect(&self) {
        if !self.getrennt.send_replace(true) {
            tracing::debug!(socket_id = %self.id, "Verbindung zum Schliessen markiert");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn emit_landet_in_queue() {
        let (socket, mut rx) = ChannelSocket::neu(SocketId::from("s1"));
        assert!(socket.emit("user-connected", vec![json!("bob")]));

        let ev = rx.recv().await.expect("Event erwartet");
        assert_eq!(ev.name, "user-connected");
        assert_eq!(ev.args, vec![json!("bob")]);
    }

    #[test]
    fn emit_bei_voller_queue_false() {
        let (socket, _rx) = ChannelSocket::neu(SocketId::from("s1"));
        for _ in 0..SEND_QUEUE_GROESSE {
            assert!(socket.emit("ping", vec![]));
        }
        assert!(!socket.emit("ping", vec![]));
    }

    #[test]
    fn emit_nach_schliessen_der_queue_false() {
        let (socket, rx) = ChannelSocket::neu(SocketId::from("s1"));
        drop(rx);
        assert!(!socket.emit("ping", vec![]));
    }

    #[tokio::test]
    async fn disconnect_setzt_trenn_signal() {
        let (socket, _rx) = ChannelSocket::neu(SocketId::from("s1"));
        let mut signal = socket.trenn_signal();
        assert!(!socket.ist_getrennt());

        socket.disconnect();
        signal.changed().await.expect("Signal erwartet");
        assert!(*signal.borrow());
        assert!(socket.ist_getrennt());
        assert!(!socket.emit("ping", vec![]), "Nach disconnect wird nicht mehr gesendet");
    }
}
