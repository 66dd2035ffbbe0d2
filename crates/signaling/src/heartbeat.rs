//! Heartbeat-Manager – Erkennt still gestorbene Verbindungen
//!
//! Jeder registrierte Socket durchlaeuft einen Ping/Pong-Zyklus:
//!
//! ```text
//! Leerlauf -> PingGeplant -> WartetAufPong -> Leerlauf        (Pong rechtzeitig)
//!                                         -> Fehlgeschlagen   (Timeout)
//! Fehlgeschlagen -> PingGeplant (verkuerztes Intervall)       (fehlversuche < max)
//!                -> tot: Event, Socket schliessen, abmelden   (fehlversuche >= max)
//! ```
//!
//! Ein toter Eintrag wird sofort aus der Tabelle entfernt.
//!
//! ## Timer
//! Jeder Eintrag hat hoechstens einen aktiven Timer-Task. Beim Neuplanen
//! wird der alte Task abgebrochen und die Generation erhoeht; ein Task, der
//! trotz Abbruch noch aufwacht, sieht eine veraltete Generation und tut nichts.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use signalhub_core::SocketId;
use signalhub_protocol::events;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::socket::SocketHandle;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse des Broadcast-Kanals fuer Heartbeat-Events
const EVENT_KANAL_GROESSE: usize = 256;

/// Obergrenze fuer das verkuerzte Intervall nach einem Fehlversuch
const MAX_RETRY_INTERVALL: Duration = Duration::from_secs(5);

/// Einstellungen des Heartbeat-Managers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Abstand zwischen zwei Pings
    pub ping_intervall: Duration,
    /// Wartezeit auf einen Pong
    pub pong_timeout: Duration,
    /// Fehlversuche bis die Verbindung als tot gilt
    pub max_fehlversuche: u32,
    /// Sockets werden nur bei aktiviertem Heartbeat ueberwacht
    pub aktiviert: bool,
    /// Debug-Logs fuer jeden Ping/Pong
    pub logging: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_intervall: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            max_fehlversuche: 3,
            aktiviert: true,
            logging: false,
        }
    }
}

impl HeartbeatConfig {
    /// Intervall fuer den naechsten Ping nach einem Fehlversuch
    pub fn retry_intervall(&self) -> Duration {
        (self.ping_intervall / 2).min(MAX_RETRY_INTERVALL)
    }
}

// ---------------------------------------------------------------------------
// Events und Zustaende
// ---------------------------------------------------------------------------

/// Events die der HeartbeatManager versendet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatEvent {
    PingGesendet { socket_id: SocketId, ping_id: String },
    PongEmpfangen { socket_id: SocketId, latenz: Duration },
    /// Pong blieb aus; `fehlversuche` zaehlt kumulativ seit dem letzten Pong
    PingTimeout { socket_id: SocketId, fehlversuche: u32 },
    VerbindungVerloren { socket_id: SocketId },
    /// Pong nach mindestens einem Fehlversuch
    VerbindungWiederhergestellt { socket_id: SocketId },
}

impl HeartbeatEvent {
    /// Protokoll-Name des Events
    pub fn name(&self) -> &'static str {
        match self {
            Self::PingGesendet { .. } => "ping-sent",
            Self::PongEmpfangen { .. } => "pong-received",
            Self::PingTimeout { .. } => "ping-timeout",
            Self::VerbindungVerloren { .. } => "connection-lost",
            Self::VerbindungWiederhergestellt { .. } => "connection-restored",
        }
    }

    pub fn socket_id(&self) -> &SocketId {
        match self {
            Self::PingGesendet { socket_id, .. }
            | Self::PongEmpfangen { socket_id, .. }
            | Self::PingTimeout { socket_id, .. }
            | Self::VerbindungVerloren { socket_id }
            | Self::VerbindungWiederhergestellt { socket_id } => socket_id,
        }
    }
}

/// Zustand eines ueberwachten Sockets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeartbeatZustand {
    Leerlauf,
    PingGeplant,
    WartetAufPong,
    Fehlgeschlagen,
}

/// Nur-Lese-Sicht auf einen ueberwachten Socket
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatStatus {
    pub socket_id: SocketId,
    pub ist_aktiv: bool,
    pub fehlversuche: u32,
    pub zustand: HeartbeatZustand,
    pub letzte_latenz_ms: Option<u64>,
    pub letzter_ping: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// HeartbeatManager
// ---------------------------------------------------------------------------

/// Rueckruf, wenn eine Verbindung als tot aufgegeben wurde
pub type VerlorenHook = Arc<dyn Fn(SocketHandle) + Send + Sync>;

struct Eintrag {
    socket: SocketHandle,
    fehlversuche: u32,
    letzter_ping: Option<Instant>,
    letzter_ping_zeit: Option<DateTime<Utc>>,
    letzte_latenz: Option<Duration>,
    ist_aktiv: bool,
    zustand: HeartbeatZustand,
    ping_id: Option<String>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

impl Eintrag {
    fn timer_abbrechen(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Ueberwacht die Lebendigkeit aller registrierten Sockets
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct HeartbeatManager {
    inner: Arc<HeartbeatInner>,
}

struct HeartbeatInner {
    config: RwLock<HeartbeatConfig>,
    laeuft: AtomicBool,
    eintraege: DashMap<SocketId, Eintrag>,
    event_tx: broadcast::Sender<HeartbeatEvent>,
    verloren_hook: RwLock<Option<VerlorenHook>>,
}

impl HeartbeatInner {
    fn protokollieren(&self) -> bool {
        self.config.read().logging
    }

    fn senden(&self, event: HeartbeatEvent) {
        // Ohne Abonnenten ist das Senden ein No-op
        let _ = self.event_tx.send(event);
    }
}

impl HeartbeatManager {
    /// Erstellt einen gestoppten Manager
    pub fn neu(config: HeartbeatConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_KANAL_GROESSE);
        Self {
            inner: Arc::new(HeartbeatInner {
                config: RwLock::new(config),
                laeuft: AtomicBool::new(false),
                eintraege: DashMap::new(),
                event_tx,
                verloren_hook: RwLock::new(None),
            }),
        }
    }

    /// Startet den Manager, optional mit neuer Konfiguration
    pub fn starten(&self, config: Option<HeartbeatConfig>) {
        if let Some(config) = config {
            *self.inner.config.write() = config;
        }
        if !self.inner.laeuft.swap(true, Ordering::SeqCst) {
            let config = self.inner.config.read();
            tracing::info!(
                ping_intervall_ms = config.ping_intervall.as_millis() as u64,
                pong_timeout_ms = config.pong_timeout.as_millis() as u64,
                max_fehlversuche = config.max_fehlversuche,
                "Heartbeat gestartet"
            );
        }
    }

    /// Stoppt den Manager, bricht alle Timer ab und vergisst alle Sockets
    pub fn stoppen(&self) {
        self.inner.laeuft.store(false, Ordering::SeqCst);
        for mut eintrag in self.inner.eintraege.iter_mut() {
            eintrag.timer_abbrechen();
        }
        let anzahl = self.inner.eintraege.len();
        self.inner.eintraege.clear();
        tracing::info!(anzahl, "Heartbeat gestoppt");
    }

    /// Laeuft der Manager?
    pub fn laeuft(&self) -> bool {
        self.inner.laeuft.load(Ordering::SeqCst)
    }

    /// Aktuelle Konfiguration
    pub fn config(&self) -> HeartbeatConfig {
        self.inner.config.read().clone()
    }

    /// Setzt den Rueckruf fuer aufgegebene Verbindungen
    pub fn verloren_hook_setzen(&self, hook: VerlorenHook) {
        *self.inner.verloren_hook.write() = Some(hook);
    }

    /// Abonniert alle Heartbeat-Events
    pub fn events_abonnieren(&self) -> broadcast::Receiver<HeartbeatEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Nimmt einen Socket in die Ueberwachung auf und plant den ersten Ping
    ///
    /// Startet den Manager falls noetig. Bei deaktiviertem Heartbeat passiert nichts.
    pub fn socket_hinzufuegen(&self, socket: SocketHandle) {
        let config = self.config();
        if !config.aktiviert {
            tracing::debug!(socket_id = %socket.id(), "Heartbeat deaktiviert – Socket nicht ueberwacht");
            return;
        }
        if !self.laeuft() {
            self.starten(None);
        }

        let socket_id = socket.id().clone();
        let neu = Eintrag {
            socket,
            fehlversuche: 0,
            letzter_ping: None,
            letzter_ping_zeit: None,
            letzte_latenz: None,
            ist_aktiv: true,
            zustand: HeartbeatZustand::Leerlauf,
            ping_id: None,
            timer: None,
            generation: 0,
        };
        if let Some(mut alt) = self.inner.eintraege.insert(socket_id.clone(), neu) {
            alt.timer_abbrechen();
        }

        tracing::debug!(socket_id = %socket_id, "Socket im Heartbeat registriert");
        planen(&self.inner, &socket_id, config.ping_intervall);
    }

    /// Nimmt einen Socket aus der Ueberwachung (idempotent)
    pub fn socket_entfernen(&self, socket_id: &SocketId) -> bool {
        match self.inner.eintraege.remove(socket_id) {
            Some((_, mut eintrag)) => {
                eintrag.timer_abbrechen();
                tracing::debug!(socket_id = %socket_id, "Socket aus Heartbeat entfernt");
                true
            }
            None => false,
        }
    }

    /// Verarbeitet einen Pong
    ///
    /// Jeder Pong zaehlt, unabhaengig von der Ping-ID.
    pub fn pong_empfangen(&self, socket_id: &SocketId) {
        let (latenz, wiederhergestellt) = {
            let Some(mut eintrag) = self.inner.eintraege.get_mut(socket_id) else {
                tracing::debug!(socket_id = %socket_id, "Pong fuer nicht ueberwachten Socket");
                return;
            };
            let latenz = eintrag
                .letzter_ping
                .map(|t| t.elapsed())
                .unwrap_or_default();
            let wiederhergestellt = eintrag.fehlversuche > 0;
            eintrag.fehlversuche = 0;
            eintrag.ist_aktiv = true;
            eintrag.letzte_latenz = Some(latenz);
            eintrag.zustand = HeartbeatZustand::Leerlauf;
            eintrag.ping_id = None;
            (latenz, wiederhergestellt)
        };

        if self.inner.protokollieren() {
            tracing::debug!(socket_id = %socket_id, latenz_ms = latenz.as_millis() as u64, "Pong empfangen");
        }
        self.inner.senden(HeartbeatEvent::PongEmpfangen {
            socket_id: socket_id.clone(),
            latenz,
        });
        if wiederhergestellt {
            tracing::info!(socket_id = %socket_id, "Verbindung wiederhergestellt");
            self.inner.senden(HeartbeatEvent::VerbindungWiederhergestellt {
                socket_id: socket_id.clone(),
            });
        }

        let intervall = self.inner.config.read().ping_intervall;
        planen(&self.inner, socket_id, intervall);
    }

    /// Status aller ueberwachten Sockets
    pub fn status(&self) -> Vec<HeartbeatStatus> {
        self.inner
            .eintraege
            .iter()
            .map(|e| HeartbeatStatus {
                socket_id: e.key().clone(),
                ist_aktiv: e.ist_aktiv,
                fehlversuche: e.fehlversuche,
                zustand: e.zustand,
                letzte_latenz_ms: e.letzte_latenz.map(|l| l.as_millis() as u64),
                letzter_ping: e.letzter_ping_zeit,
            })
            .collect()
    }

    /// Anzahl ueberwachter Sockets
    pub fn anzahl(&self) -> usize {
        self.inner.eintraege.len()
    }
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Plant den naechsten Ping; ersetzt einen laufenden Timer
fn planen(inner: &Arc<HeartbeatInner>, socket_id: &SocketId, verzoegerung: Duration) {
    let Some(mut eintrag) = inner.eintraege.get_mut(socket_id) else {
        return;
    };
    eintrag.timer_abbrechen();
    eintrag.generation += 1;
    eintrag.zustand = HeartbeatZustand::PingGeplant;

    let generation = eintrag.generation;
    let schwach = Arc::downgrade(inner);
    let id = socket_id.clone();
    eintrag.timer = Some(tokio::spawn(async move {
        tokio::time::sleep(verzoegerung).await;
        if let Some(inner) = schwach.upgrade() {
            ping_senden(&inner, &id, generation);
        }
    }));
}

fn ping_senden(inner: &Arc<HeartbeatInner>, socket_id: &SocketId, generation: u64) {
    if !inner.laeuft.load(Ordering::SeqCst) {
        return;
    }
    let pong_timeout = inner.config.read().pong_timeout;

    let (socket, ping_id) = {
        let Some(mut eintrag) = inner.eintraege.get_mut(socket_id) else {
            return;
        };
        if eintrag.generation != generation {
            return;
        }
        let ping_id = uuid::Uuid::new_v4().simple().to_string();
        eintrag.ping_id = Some(ping_id.clone());
        eintrag.letzter_ping = Some(Instant::now());
        eintrag.letzter_ping_zeit = Some(Utc::now());
        eintrag.zustand = HeartbeatZustand::WartetAufPong;
        eintrag.generation += 1;

        // Ersetzt den Handle dieses Tasks, der gleich endet
        let timeout_generation = eintrag.generation;
        let schwach: Weak<HeartbeatInner> = Arc::downgrade(inner);
        let id = socket_id.clone();
        eintrag.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(pong_timeout).await;
            if let Some(inner) = schwach.upgrade() {
                pong_ausgeblieben(&inner, &id, timeout_generation);
            }
        }));

        (eintrag.socket.clone(), ping_id)
    };

    let gesendet = socket.emit(
        events::PING,
        vec![json!({
            "pingId": ping_id,
            "timestamp": Utc::now().timestamp_millis(),
        })],
    );
    if inner.protokollieren() {
        tracing::debug!(socket_id = %socket_id, ping_id = %ping_id, gesendet, "Ping gesendet");
    }
    inner.senden(HeartbeatEvent::PingGesendet {
        socket_id: socket_id.clone(),
        ping_id,
    });
}

fn pong_ausgeblieben(inner: &Arc<HeartbeatInner>, socket_id: &SocketId, generation: u64) {
    let config = inner.config.read().clone();

    let fehlversuche = {
        let Some(mut eintrag) = inner.eintraege.get_mut(socket_id) else {
            return;
        };
        if eintrag.generation != generation {
            return;
        }
        eintrag.fehlversuche += 1;
        eintrag.ist_aktiv = false;
        eintrag.zustand = HeartbeatZustand::Fehlgeschlagen;
        eintrag.ping_id = None;
        eintrag.fehlversuche
    };

    tracing::debug!(socket_id = %socket_id, fehlversuche, "Pong-Timeout");
    inner.senden(HeartbeatEvent::PingTimeout {
        socket_id: socket_id.clone(),
        fehlversuche,
    });

    if fehlversuche < config.max_fehlversuche {
        planen(inner, socket_id, config.retry_intervall());
        return;
    }

    // Nur entfernen wenn inzwischen kein Pong neu geplant hat
    let Some((_, eintrag)) = inner
        .eintraege
        .remove_if(socket_id, |_, e| e.generation == generation)
    else {
        return;
    };

    tracing::warn!(socket_id = %socket_id, fehlversuche, "Verbindung verloren – Socket wird geschlossen");
    inner.senden(HeartbeatEvent::VerbindungVerloren {
        socket_id: socket_id.clone(),
    });
    eintrag.socket.disconnect();

    let hook = inner.verloren_hook.read().clone();
    if let Some(hook) = hook {
        hook(eintrag.socket.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
