//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer `ClientConnection`.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::connection::{ClientConnection, VerbindungsConfig};
use crate::hub::SignalingHub;

/// TCP-Signaling-Server
///
/// Bindet einen TCP-Socket und akzeptiert Verbindungen in einer Loop.
pub struct SignalingServer {
    hub: SignalingHub,
    bind_addr: SocketAddr,
    verbindung: VerbindungsConfig,
    max_verbindungen: usize,
}

impl SignalingServer {
    /// Erstellt einen neuen SignalingServer
    pub fn neu(hub: SignalingHub, bind_addr: SocketAddr) -> Self {
        Self {
            hub,
            bind_addr,
            verbindung: VerbindungsConfig::default(),
            max_verbindungen: usize::MAX,
        }
    }

    /// Setzt die Einstellungen pro Verbindung
    pub fn mit_verbindungs_config(mut self, config: VerbindungsConfig) -> Self {
        self.verbindung = config;
        self
    }

    /// Begrenzt die Zahl gleichzeitig verbundener Benutzer
    pub fn mit_max_verbindungen(mut self, max: usize) -> Self {
        self.max_verbindungen = max;
        self
    }

    /// Bindet den Listener und akzeptiert Verbindungen
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.accept_loop(listener, shutdown_rx).await
    }

    /// Akzeptiert Verbindungen auf einem bereits gebundenen Listener
    pub async fn accept_loop(
        self,
        listener: TcpListener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let lokale_addr = listener.local_addr()?;

        tracing::info!(
            adresse = %lokale_addr,
            "TCP Signaling-Server gestartet"
        );

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let online = self.hub.verbindungs_statistik().total_users;
                            if online >= self.max_verbindungen {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.max_verbindungen,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            }

                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                            }
                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                            let verbindung = ClientConnection::neu(
                                self.hub.clone(),
                                peer_addr,
                                self.verbindung.clone(),
                            );
                            let shutdown_rx_clone = shutdown_rx.clone();
                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Signaling-Server gestoppt");
        Ok(())
    }

    /// Gibt die Bind-Adresse zurueck
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
