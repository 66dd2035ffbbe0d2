//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use signalhub_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use signalhub_protocol::STANDARD_NACHRICHTEN_EVENT;
use signalhub_signaling::{HeartbeatConfig, SignalingConfig, VerbindungsConfig};
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Umgebungsvariable, die `logging.level` uebersteuert
pub const LOG_ENV: &str = "SIGNALHUB_LOG";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Raum-Einstellungen
    pub raeume: RaumEinstellungen,
    /// Heartbeat-Einstellungen
    pub heartbeat: HeartbeatEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Frei durchgereichte Optionen
    pub optionen: Map<String, Value>,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitig verbundener Benutzer
    pub max_verbindungen: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Signalhub".into(),
            max_verbindungen: 10_000,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den TCP-Listener
    pub bind_adresse: String,
    /// Port fuer den TCP-Listener
    pub tcp_port: u16,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
    /// Sekunden bis der Handshake eingetroffen sein muss
    pub handshake_timeout_sek: u64,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 9001,
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
            handshake_timeout_sek: 10,
        }
    }
}

/// Raum-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaumEinstellungen {
    /// Kapazitaet, wenn der Client keine angibt
    pub max_teilnehmer: usize,
    /// Event-Name fuer Signaling-Nachrichten, wenn der Client keinen angibt
    pub nachrichten_event: String,
}

impl Default for RaumEinstellungen {
    fn default() -> Self {
        Self {
            max_teilnehmer: 1000,
            nachrichten_event: STANDARD_NACHRICHTEN_EVENT.into(),
        }
    }
}

/// Heartbeat-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatEinstellungen {
    pub aktiviert: bool,
    pub ping_intervall_ms: u64,
    pub pong_timeout_ms: u64,
    pub max_fehlversuche: u32,
    /// Debug-Logs fuer jeden Ping/Pong
    pub logging: bool,
}

impl Default for HeartbeatEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            ping_intervall_ms: 30_000,
            pong_timeout_ms: 10_000,
            max_fehlversuche: 3,
            logging: false,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl LoggingEinstellungen {
    /// Filter aus `SIGNALHUB_LOG` oder dem konfigurierten Level
    ///
    /// Ein unlesbares Level faellt auf `info` zurueck.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Installiert den globalen Subscriber im konfigurierten Format
    pub fn initialisieren(&self) -> anyhow::Result<()> {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_target(true);
        let ergebnis = match self.format.as_str() {
            "json" => builder
                .json()
                .with_thread_ids(true)
                .with_current_span(true)
                .try_init(),
            _ => builder.try_init(),
        };
        ergebnis.map_err(|e| anyhow::anyhow!("Logging konnte nicht initialisiert werden: {e}"))
    }
}

/// Ungueltige Werte in der Konfiguration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigFehler {
    #[error("raeume.max_teilnehmer muss mindestens 1 sein")]
    KeineTeilnehmer,
    #[error("raeume.nachrichten_event darf nicht leer sein")]
    LeeresNachrichtenEvent,
    #[error("heartbeat.{0} muss groesser als 0 sein")]
    HeartbeatNull(&'static str),
    #[error("netzwerk.max_frame_groesse muss groesser als 0 sein")]
    FrameGroesse,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.validieren()?;
        Ok(config)
    }

    /// Prueft Werte, die serde allein nicht ausschliessen kann
    pub fn validieren(&self) -> Result<(), ConfigFehler> {
        if self.raeume.max_teilnehmer == 0 {
            return Err(ConfigFehler::KeineTeilnehmer);
        }
        if self.raeume.nachrichten_event.trim().is_empty() {
            return Err(ConfigFehler::LeeresNachrichtenEvent);
        }
        if self.heartbeat.ping_intervall_ms == 0 {
            return Err(ConfigFehler::HeartbeatNull("ping_intervall_ms"));
        }
        if self.heartbeat.pong_timeout_ms == 0 {
            return Err(ConfigFehler::HeartbeatNull("pong_timeout_ms"));
        }
        if self.heartbeat.max_fehlversuche == 0 {
            return Err(ConfigFehler::HeartbeatNull("max_fehlversuche"));
        }
        if self.netzwerk.max_frame_groesse == 0 {
            return Err(ConfigFehler::FrameGroesse);
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }

    /// Konfiguration fuer den Signalhub-Kern
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            heartbeat: HeartbeatConfig {
                ping_intervall: Duration::from_millis(self.heartbeat.ping_intervall_ms),
                pong_timeout: Duration::from_millis(self.heartbeat.pong_timeout_ms),
                max_fehlversuche: self.heartbeat.max_fehlversuche,
                aktiviert: self.heartbeat.aktiviert,
                logging: self.heartbeat.logging,
            },
            max_teilnehmer_standard: self.raeume.max_teilnehmer,
            nachrichten_event: self.raeume.nachrichten_event.clone(),
            zusatz_optionen: self.optionen.clone(),
        }
    }

    /// Einstellungen pro TCP-Verbindung
    pub fn verbindungs_config(&self) -> VerbindungsConfig {
        VerbindungsConfig {
            max_frame_groesse: self.netzwerk.max_frame_groesse,
            handshake_timeout: Duration::from_secs(self.netzwerk.handshake_timeout_sek),
        }
    }
}
