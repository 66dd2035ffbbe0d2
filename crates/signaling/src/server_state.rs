//! Gemeinsamer Zustand des Signalhub
//!
//! Haelt Konfiguration, Verzeichnis und Heartbeat-Manager als geteilte
//! Referenzen, die sicher zwischen tokio-Tasks geteilt werden koennen.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use signalhub_core::UserId;
use signalhub_protocol::STANDARD_NACHRICHTEN_EVENT;
use std::sync::Arc;
use std::time::Instant;

use crate::directory::RoomDirectory;
use crate::heartbeat::{HeartbeatConfig, HeartbeatManager};

/// Rueckruf nach abgeschlossener Bereinigung einer Verbindung
pub type TrennCallback = Arc<dyn Fn(&UserId) + Send + Sync>;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Heartbeat-Einstellungen
    pub heartbeat: HeartbeatConfig,
    /// Raum-Kapazitaet, wenn der Client keine angibt
    pub max_teilnehmer_standard: usize,
    /// Event-Name fuer Signaling-Nachrichten, wenn der Client keinen angibt
    pub nachrichten_event: String,
    /// Frei durchgereichte Optionen
    pub zusatz_optionen: Map<String, Value>,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatConfig::default(),
            max_teilnehmer_standard: 1000,
            nachrichten_event: STANDARD_NACHRICHTEN_EVENT.to_string(),
            zusatz_optionen: Map::new(),
        }
    }
}

/// Gemeinsamer Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Benutzer, Raeume und Paarungen
    pub verzeichnis: RoomDirectory,
    /// Lebendigkeitspruefung aller Verbindungen
    pub heartbeat: HeartbeatManager,
    /// Optionaler Rueckruf nach jeder Bereinigung
    pub trenn_callback: RwLock<Option<TrennCallback>>,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig) -> Arc<Self> {
        let heartbeat = HeartbeatManager::neu(config.heartbeat.clone());
        Arc::new(Self {
            config: Arc::new(config),
            verzeichnis: RoomDirectory::neu(),
            heartbeat,
            trenn_callback: RwLock::new(None),
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
