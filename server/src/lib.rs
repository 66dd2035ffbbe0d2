//! signalhub-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use signalhub_core::UserId;
use signalhub_signaling::{SignalingHub, SignalingServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    hub: SignalingHub,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        let hub = SignalingHub::neu(config.signaling_config()).mit_trenn_callback(Arc::new(
            |user_id: &UserId| tracing::debug!(user_id = %user_id, "Benutzer abgemeldet"),
        ));
        Self { config, hub }
    }

    /// Hub fuer Administration
    pub fn hub(&self) -> &SignalingHub {
        &self.hub
    }

    /// Startet den TCP-Listener und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Bind-Adresse aufloesen
    /// 2. TCP-Listener starten
    /// 3. Auf Ctrl-C warten
    /// 4. Verbindungen beenden, Heartbeat stoppen
    pub async fn starten(self) -> Result<()> {
        let bind_addr: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.tcp_bind_adresse()))?;

        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %bind_addr,
            max_teilnehmer = self.config.raeume.max_teilnehmer,
            heartbeat = self.config.heartbeat.aktiviert,
            "Server startet"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = SignalingServer::neu(self.hub.clone(), bind_addr)
            .mit_verbindungs_config(self.config.verbindungs_config())
            .mit_max_verbindungen(self.config.server.max_verbindungen);
        let mut server_task = tokio::spawn(server.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::select! {
            ergebnis = &mut server_task => {
                // Listener ist vorzeitig beendet (z.B. Port belegt)
                ergebnis
                    .context("TCP-Listener-Task abgebrochen")?
                    .context("TCP-Listener fehlgeschlagen")?;
                return Ok(());
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Ctrl-C-Handler konnte nicht installiert werden")?;
            }
        }

        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        // Empfaenger koennen schon weg sein
        let _ = shutdown_tx.send(true);
        server_task
            .await
            .context("TCP-Listener-Task abgebrochen")?
            .context("TCP-Listener fehlgeschlagen")?;
        self.hub.heartbeat_stoppen();

        let statistik = self.hub.verbindungs_statistik();
        tracing::info!(
            benutzer = statistik.total_users,
            raeume = statistik.total_rooms,
            uptime_sek = statistik.uptime_secs,
            "Server beendet"
        );
        Ok(())
    }
}
