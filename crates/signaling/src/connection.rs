//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task.
//!
//! ## Ablauf
//! ```text
//! Handshake-Frame -> verbindung_annehmen -> Event-Schleife -> verbindung_getrennt
//!        |                   |
//!        +-- Timeout         +-- abgelehnt: Ausstehendes senden, schliessen
//! ```
//!
//! Die Event-Schleife verarbeitet eingehende Frames strikt nacheinander.
//! Ausgehende Events kommen aus der Send-Queue des [`ChannelSocket`];
//! `disconnect()` auf dem Socket beendet die Schleife nachdem die Queue
//! geleert wurde.

use futures_util::{SinkExt, StreamExt};
use signalhub_core::SocketId;
use signalhub_protocol::{Frame, FrameCodec, HandshakeQuery};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

use crate::error::{SignalingError, SignalingResult};
use crate::hub::SignalingHub;
use crate::socket::{AusgehendesEvent, ChannelSocket};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Einstellungen pro Verbindung
#[derive(Debug, Clone)]
pub struct VerbindungsConfig {
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
    /// Zeit bis der Handshake-Frame eingetroffen sein muss
    pub handshake_timeout: Duration,
}

impl Default for VerbindungsConfig {
    fn default() -> Self {
        Self {
            max_frame_groesse: signalhub_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `FrameCodec`, reicht Events an den Hub weiter und
/// sendet Completions und ausgehende Events zurueck.
pub struct ClientConnection {
    hub: SignalingHub,
    peer_addr: SocketAddr,
    config: VerbindungsConfig,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(hub: SignalingHub, peer_addr: SocketAddr, config: VerbindungsConfig) -> Self {
        Self {
            hub,
            peer_addr,
            config,
        }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal eingeht.
    pub async fn verarbeiten<S>(self, stream: S, mut shutdown_rx: watch::Receiver<bool>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let peer_addr = self.peer_addr;
        let mut framed = Framed::new(stream, FrameCodec::with_max_size(self.config.max_frame_groesse));

        let query = match self.handshake_lesen(&mut framed).await {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(peer = %peer_addr, fehler = %e, "Handshake fehlgeschlagen");
                return;
            }
        };

        let socket_id = SocketId::new();
        let (socket, mut sende_rx) = ChannelSocket::neu(socket_id.clone());
        let mut trenn_rx = socket.trenn_signal();

        match self.hub.verbindung_annehmen(socket.clone(), query) {
            Ok(user_id) => {
                tracing::info!(peer = %peer_addr, user_id = %user_id, socket_id = %socket_id, "Neue Verbindung");
            }
            Err(e) => {
                tracing::info!(peer = %peer_addr, fehler = %e, "Verbindung abgelehnt");
                ausstehende_senden(&mut framed, &mut sende_rx).await;
                return;
            }
        }

        loop {
            tokio::select! {
                // Eingehender Frame vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(Frame::Event { event, args, ack })) => {
                            tracing::trace!(peer = %peer_addr, event = %event, "Event empfangen");
                            let antwort = self.hub.event_verarbeiten(&socket_id, &event, &args);
                            if let (Some(ack), Some(antwort)) = (ack, antwort) {
                                if let Err(e) = framed.send(Frame::ack(ack, antwort)).await {
                                    tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                                    break;
                                }
                            }
                        }
                        Some(Ok(anderer)) => {
                            tracing::debug!(peer = %peer_addr, frame = ?anderer, "Unerwarteter Frame ignoriert");
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehendes Event aus der Send-Queue
                Some(ausgehend) = sende_rx.recv() => {
                    let frame = Frame::event(ausgehend.name, ausgehend.args);
                    if let Err(e) = framed.send(frame).await {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Event-Senden fehlgeschlagen");
                        break;
                    }
                }

                // Serverseitig getrennt (Kick, Raum geschlossen, Heartbeat)
                Ok(()) = trenn_rx.changed() => {
                    if *trenn_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Verbindung serverseitig getrennt");
                        ausstehende_senden(&mut framed, &mut sende_rx).await;
                        break;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        break;
                    }
                }
            }
        }

        self.hub.verbindung_getrennt(&socket_id);
        tracing::info!(peer = %peer_addr, "Verbindungs-Task beendet");
    }

    /// Liest den ersten Frame; er muss ein Handshake sein
    async fn handshake_lesen<S>(&self, framed: &mut Framed<S, FrameCodec>) -> SignalingResult<HandshakeQuery>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let frame = tokio::time::timeout(self.config.handshake_timeout, framed.next())
            .await
            .map_err(|_| SignalingError::protokoll("Handshake-Timeout"))?;
        match frame {
            Some(Ok(Frame::Handshake(query))) => Ok(query),
            Some(Ok(_)) => Err(SignalingError::protokoll("Erster Frame ist kein Handshake")),
            Some(Err(e)) => Err(e.into()),
            None => Err(SignalingError::protokoll("Verbindung vor dem Handshake geschlossen")),
        }
    }
}

/// Sendet alles, was noch in der Queue liegt
async fn ausstehende_senden<S>(
    framed: &mut Framed<S, FrameCodec>,
    sende_rx: &mut mpsc::Receiver<AusgehendesEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Ok(ausgehend) = sende_rx.try_recv() {
        if framed
            .send(Frame::event(ausgehend.name, ausgehend.args))
            .await
            .is_err()
        {
            break;
        }
    }
}
