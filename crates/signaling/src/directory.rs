//! Raum- und Benutzerverzeichnis
//!
//! Haelt alle verbundenen Benutzer, alle offenen Raeume und die Paarungen
//! zwischen Benutzern. Das Verzeichnis macht selbst kein I/O: Operationen,
//! nach denen jemand benachrichtigt werden muss, geben die betroffenen
//! Socket-Handles zurueck und der Aufrufer sendet.
//!
//! ## Nebenlaeufigkeit
//! Ein einziger `parking_lot::Mutex` schuetzt den gesamten Zustand. Jede
//! veraendernde Operation ist genau ein kritischer Abschnitt, damit z.B. zwei
//! gleichzeitige Beitritte die Kapazitaet eines Raums nie ueberschreiten.
//!
//! ## Invarianten
//! - Solange ein Raum existiert ist sein Besitzer Teilnehmer
//! - `participants.len() <= max_participants_allowed`
//! - Ein leerer Raum wird in derselben Operation geloescht, die ihn leert

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use signalhub_core::{RoomId, SocketId, UserId};
use signalhub_protocol::{PublicRoom, SessionFlags};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{SignalingError, SignalingResult};
use crate::socket::SocketHandle;

// ---------------------------------------------------------------------------
// Datensaetze
// ---------------------------------------------------------------------------

/// Alles, was beim Verbindungsaufbau ueber einen neuen Benutzer bekannt ist
pub struct NeuerBenutzer {
    pub user_id: UserId,
    pub socket: SocketHandle,
    pub extra: Value,
    /// Event-Name fuer Signaling-Nachrichten an diesen Benutzer
    pub message_event: String,
    pub custom_event: Option<String>,
    /// Im Handshake angefragte Raum-ID
    pub session_id: RoomId,
    pub auto_close_entire_session: bool,
    /// Kapazitaet fuer Raeume, die dieser Benutzer oeffnet
    pub max_participants_allowed: usize,
}

struct User {
    user_id: UserId,
    socket: SocketHandle,
    connected_with: HashMap<UserId, SocketHandle>,
    extra: Value,
    message_event: String,
    custom_events: HashSet<String>,
    custom_event: Option<String>,
    room_id: Option<RoomId>,
    session_id: RoomId,
    auto_close_entire_session: bool,
    max_participants_allowed: usize,
    connected_at: DateTime<Utc>,
    /// Gesetzt sobald die Bereinigung die Verbindung beansprucht hat
    abmeldend: bool,
}

struct Room {
    session_id: RoomId,
    owner: UserId,
    participants: Vec<UserId>,
    max_participants_allowed: usize,
    password: Option<String>,
    identifier: String,
    session: SessionFlags,
    extra: Value,
    socket_custom_event: Option<String>,
    created_at: DateTime<Utc>,
    seq: u64,
}

impl Room {
    fn ist_voll(&self) -> bool {
        self.participants.len() >= self.max_participants_allowed
    }

    fn hat_passwort(&self) -> bool {
        self.password.is_some()
    }
}

/// Parameter fuer `open-room`
#[derive(Debug, Clone)]
pub struct RaumOeffnen {
    pub room_id: RoomId,
    pub session: SessionFlags,
    pub identifier: String,
    pub password: Option<String>,
    pub extra: Value,
    /// Neue Zusatzdaten des Besitzers, erst nach erfolgreichem Oeffnen gesetzt
    pub benutzer_extra: Option<Value>,
}

impl RaumOeffnen {
    /// Privater Raum ohne Passwort und ohne Zusatzdaten
    pub fn neu(room_id: RoomId) -> Self {
        Self {
            room_id,
            session: SessionFlags::default(),
            identifier: String::new(),
            password: None,
            extra: Value::Object(Map::new()),
            benutzer_extra: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ergebnisse
// ---------------------------------------------------------------------------

/// Ergebnis des Entfernens eines Teilnehmers aus einem Raum
#[derive(Clone)]
pub enum Entfernung {
    /// Benutzer war nicht Teilnehmer
    NichtImRaum,
    /// Teilnehmer entfernt, Raum besteht weiter
    Entfernt { room_id: RoomId },
    /// Besitzer ist gegangen, Besitz ging an den ersten lebenden Teilnehmer
    BesitzUebertragen {
        room_id: RoomId,
        neuer_besitzer: UserId,
        socket: SocketHandle,
    },
    /// Raum wurde geloescht
    RaumGeloescht { room_id: RoomId },
}

impl std::fmt::Debug for Entfernung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NichtImRaum => f.write_str("NichtImRaum"),
            Self::Entfernt { room_id } => write!(f, "Entfernt({room_id})"),
            Self::BesitzUebertragen {
                room_id,
                neuer_besitzer,
                ..
            } => write!(f, "BesitzUebertragen({room_id} -> {neuer_besitzer})"),
            Self::RaumGeloescht { room_id } => write!(f, "RaumGeloescht({room_id})"),
        }
    }
}

/// Ergebnis eines Paarungsversuchs
pub enum Paarung {
    /// Erstkontakt: beide Seiten muessen sich gegenseitig vorgestellt werden
    Neu {
        socket_a: SocketHandle,
        socket_b: SocketHandle,
    },
    /// Paarung bestand bereits
    Bestehend,
    /// Mindestens eine Seite ist nicht (mehr) verbunden
    Unbekannt,
}

/// Alles, was fuer die Weiterleitung an einen gepaarten Benutzer noetig ist
pub struct RelayZiel {
    pub socket: SocketHandle,
    pub message_event: String,
    pub sender_extra: Value,
}

/// Raum-Daten fuer die Vorstellung eines neuen Teilnehmers
#[derive(Debug, Clone)]
pub struct Einfuehrung {
    pub owner: UserId,
    pub einweg: bool,
    /// Alle Teilnehmer ausser dem Beitretenden, in Beitrittsreihenfolge
    pub teilnehmer: Vec<UserId>,
}

/// Wie ein eingehendes Event fuer einen Benutzer einzuordnen ist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventArt {
    /// Ausgehandeltes Signaling-Event
    Nachricht,
    /// Registriertes Custom-Event
    Custom,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Nur-Lese-Sicht auf einen Benutzer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: UserId,
    pub socket_id: SocketId,
    pub connected_with: Vec<UserId>,
    pub extra: Value,
    pub room_id: Option<RoomId>,
    pub socket_message_event: String,
    pub custom_events: Vec<String>,
    pub connected_at: DateTime<Utc>,
}

/// Nur-Lese-Sicht auf einen Raum
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub session_id: RoomId,
    pub owner: UserId,
    pub participants: Vec<UserId>,
    pub max_participants_allowed: usize,
    pub identifier: String,
    pub is_password_protected: bool,
    pub session: SessionFlags,
    pub extra: Value,
    pub socket_custom_event: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RoomDirectory
// ---------------------------------------------------------------------------

/// Verzeichnis aller Benutzer und Raeume
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct RoomDirectory {
    inner: Arc<Mutex<DirectoryInner>>,
}

#[derive(Default)]
struct DirectoryInner {
    users: HashMap<UserId, User>,
    rooms: HashMap<RoomId, Room>,
    /// Socket -> Benutzer, nur fuer noch nicht abmeldende Verbindungen
    sockets: HashMap<SocketId, UserId>,
    raum_seq: u64,
}

impl DirectoryInner {
    fn live(&self, user_id: &UserId) -> Option<&User> {
        self.users.get(user_id).filter(|u| !u.abmeldend)
    }

    fn live_mut(&mut self, user_id: &UserId) -> Option<&mut User> {
        self.users.get_mut(user_id).filter(|u| !u.abmeldend)
    }

    fn ist_live(&self, user_id: &UserId) -> bool {
        self.live(user_id).is_some()
    }

    /// Loescht einen Raum und loest die Raum-Zuordnung aller Mitglieder
    fn raum_entfernen(&mut self, room_id: &RoomId) -> Option<Room> {
        let room = self.rooms.remove(room_id)?;
        for teilnehmer in &room.participants {
            if let Some(user) = self.users.get_mut(teilnehmer) {
                if user.room_id.as_ref() == Some(room_id) {
                    user.room_id = None;
                }
            }
        }
        tracing::info!(room_id = %room_id, "Raum geloescht");
        Some(room)
    }

    /// Entfernt einen Teilnehmer und wendet die Besitz- und Loeschregeln an
    fn entfernen(&mut self, room_id: &RoomId, user_id: &UserId, erzwingen: bool) -> Entfernung {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Entfernung::NichtImRaum;
        };
        let Some(pos) = room.participants.iter().position(|p| p == user_id) else {
            return Entfernung::NichtImRaum;
        };
        room.participants.remove(pos);
        let war_besitzer = room.owner == *user_id;
        let einweg = room.session.ist_einweg();

        if let Some(user) = self.users.get_mut(user_id) {
            if user.room_id.as_ref() == Some(room_id) {
                user.room_id = None;
            }
        }

        if war_besitzer {
            let auto_close = self
                .users
                .get(user_id)
                .is_some_and(|u| u.auto_close_entire_session);
            let nachfolger = if erzwingen || auto_close || einweg {
                None
            } else {
                self.rooms.get(room_id).and_then(|r| {
                    r.participants
                        .iter()
                        .find(|p| self.ist_live(p))
                        .cloned()
                })
            };

            let Some(neuer_besitzer) = nachfolger else {
                self.raum_entfernen(room_id);
                return Entfernung::RaumGeloescht {
                    room_id: room_id.clone(),
                };
            };
            let socket = match self.live(&neuer_besitzer) {
                Some(u) => u.socket.clone(),
                None => {
                    self.raum_entfernen(room_id);
                    return Entfernung::RaumGeloescht {
                        room_id: room_id.clone(),
                    };
                }
            };
            if let Some(room) = self.rooms.get_mut(room_id) {
                room.owner = neuer_besitzer.clone();
            }
            tracing::info!(
                room_id = %room_id,
                alter_besitzer = %user_id,
                neuer_besitzer = %neuer_besitzer,
                "Raum-Besitz uebertragen"
            );
            return Entfernung::BesitzUebertragen {
                room_id: room_id.clone(),
                neuer_besitzer,
                socket,
            };
        }

        if self
            .rooms
            .get(room_id)
            .is_some_and(|r| r.participants.is_empty())
        {
            self.raum_entfernen(room_id);
            return Entfernung::RaumGeloescht {
                room_id: room_id.clone(),
            };
        }

        Entfernung::Entfernt {
            room_id: room_id.clone(),
        }
    }

    /// Verlaesst den aktuellen Raum, falls er sich von `ziel` unterscheidet
    fn aktuellen_raum_verlassen(&mut self, user_id: &UserId, ziel: &RoomId) -> Option<Entfernung> {
        let aktuell = self.live(user_id)?.room_id.clone()?;
        if aktuell == *ziel {
            return None;
        }
        Some(self.entfernen(&aktuell, user_id, false))
    }

    fn user_info(user: &User) -> UserInfo {
        let mut connected_with: Vec<UserId> = user.connected_with.keys().cloned().collect();
        connected_with.sort();
        let mut custom_events: Vec<String> = user.custom_events.iter().cloned().collect();
        custom_events.sort();
        UserInfo {
            user_id: user.user_id.clone(),
            socket_id: user.socket.id().clone(),
            connected_with,
            extra: user.extra.clone(),
            room_id: user.room_id.clone(),
            socket_message_event: user.message_event.clone(),
            custom_events,
            connected_at: user.connected_at,
        }
    }

    fn room_info(room: &Room) -> RoomInfo {
        RoomInfo {
            session_id: room.session_id.clone(),
            owner: room.owner.clone(),
            participants: room.participants.clone(),
            max_participants_allowed: room.max_participants_allowed,
            identifier: room.identifier.clone(),
            is_password_protected: room.hat_passwort(),
            session: room.session,
            extra: room.extra.clone(),
            socket_custom_event: room.socket_custom_event.clone(),
            created_at: room.created_at,
        }
    }

    fn raeume_sortiert(&self) -> Vec<&Room> {
        let mut raeume: Vec<&Room> = self.rooms.values().collect();
        raeume.sort_by_key(|r| r.seq);
        raeume
    }
}

/// Leere Passwoerter zaehlen als "kein Passwort"
fn passwort_normalisieren(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.is_empty())
}

impl RoomDirectory {
    /// Erstellt ein leeres Verzeichnis
    pub fn neu() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Benutzer
    // -----------------------------------------------------------------------

    /// Registriert einen neuen Benutzer
    ///
    /// Eine ID bleibt belegt bis die Bereinigung ihres bisherigen Benutzers
    /// abgeschlossen ist.
    pub fn benutzer_registrieren(&self, neu: NeuerBenutzer) -> SignalingResult<()> {
        let mut inner = self.inner.lock();
        if inner.users.contains_key(&neu.user_id) {
            return Err(SignalingError::UserIdVergeben(neu.user_id.0));
        }

        let mut custom_events = HashSet::new();
        if let Some(name) = &neu.custom_event {
            custom_events.insert(name.clone());
        }
        let socket_id = neu.socket.id().clone();
        inner.sockets.insert(socket_id.clone(), neu.user_id.clone());
        inner.users.insert(
            neu.user_id.clone(),
            User {
                user_id: neu.user_id.clone(),
                socket: neu.socket,
                connected_with: HashMap::new(),
                extra: neu.extra,
                message_event: neu.message_event,
                custom_events,
                custom_event: neu.custom_event,
                room_id: None,
                session_id: neu.session_id,
                auto_close_entire_session: neu.auto_close_entire_session,
                max_participants_allowed: neu.max_participants_allowed.max(1),
                connected_at: Utc::now(),
                abmeldend: false,
            },
        );

        tracing::info!(user_id = %neu.user_id, socket_id = %socket_id, "Benutzer registriert");
        Ok(())
    }

    /// Ist der Benutzer verbunden und nicht in der Abmeldung?
    pub fn ist_live(&self, user_id: &UserId) -> bool {
        self.inner.lock().ist_live(user_id)
    }

    /// Benutzer hinter einer Verbindung
    pub fn user_von_socket(&self, socket_id: &SocketId) -> Option<UserId> {
        self.inner.lock().sockets.get(socket_id).cloned()
    }

    /// Socket eines lebenden Benutzers
    pub fn socket_von(&self, user_id: &UserId) -> Option<SocketHandle> {
        self.inner.lock().live(user_id).map(|u| u.socket.clone())
    }

    /// Im Handshake angefragte Raum-ID eines Benutzers
    pub fn session_id_von(&self, user_id: &UserId) -> Option<RoomId> {
        self.inner.lock().live(user_id).map(|u| u.session_id.clone())
    }

    /// Aktueller Raum eines Benutzers
    pub fn raum_von(&self, user_id: &UserId) -> Option<RoomId> {
        self.inner.lock().live(user_id).and_then(|u| u.room_id.clone())
    }

    /// Zusatzdaten eines lebenden Benutzers
    pub fn extra_von(&self, user_id: &UserId) -> Option<Value> {
        self.inner.lock().live(user_id).map(|u| u.extra.clone())
    }

    /// Ordnet einen Event-Namen fuer einen Benutzer ein
    pub fn event_zuordnen(&self, user_id: &UserId, event: &str) -> Option<EventArt> {
        let inner = self.inner.lock();
        let user = inner.live(user_id)?;
        if user.message_event == event {
            Some(EventArt::Nachricht)
        } else if user.custom_events.contains(event) {
            Some(EventArt::Custom)
        } else {
            None
        }
    }

    /// Setzt die Zusatzdaten und liefert alle Empfaenger der Aenderung
    ///
    /// Empfaenger sind alle gepaarten Benutzer und alle Teilnehmer des
    /// eigenen Raums, ohne Duplikate und ohne den Benutzer selbst. Ist der
    /// Benutzer Raum-Besitzer, werden auch die Zusatzdaten des Raums ersetzt.
    pub fn extra_aktualisieren(
        &self,
        user_id: &UserId,
        extra: Value,
    ) -> SignalingResult<Vec<(UserId, SocketHandle)>> {
        let mut inner = self.inner.lock();
        let user = inner
            .live_mut(user_id)
            .ok_or_else(|| SignalingError::BenutzerNichtGefunden(user_id.0.clone()))?;
        user.extra = extra.clone();
        let room_id = user.room_id.clone();

        let mut gesehen: HashSet<UserId> = HashSet::new();
        gesehen.insert(user_id.clone());
        let mut empfaenger: Vec<(UserId, SocketHandle)> = Vec::new();

        let user = inner
            .live(user_id)
            .ok_or_else(|| SignalingError::BenutzerNichtGefunden(user_id.0.clone()))?;
        for (peer, socket) in &user.connected_with {
            if gesehen.insert(peer.clone()) {
                empfaenger.push((peer.clone(), socket.clone()));
            }
        }

        if let Some(room_id) = room_id {
            if let Some(room) = inner.rooms.get(&room_id) {
                for teilnehmer in &room.participants {
                    if !gesehen.insert(teilnehmer.clone()) {
                        continue;
                    }
                    if let Some(u) = inner.live(teilnehmer) {
                        empfaenger.push((teilnehmer.clone(), u.socket.clone()));
                    }
                }
            }
            if let Some(room) = inner.rooms.get_mut(&room_id) {
                if room.owner == *user_id {
                    room.extra = extra;
                }
            }
        }

        Ok(empfaenger)
    }

    /// Benennt einen Benutzer um
    ///
    /// Verschiebt Verzeichnis-Schluessel, Socket-Index, die Paarungen aller
    /// Gegenseiten sowie Teilnehmer- und Besitzer-Eintrag des Raums.
    pub fn benutzer_umbenennen(&self, alt: &UserId, neu: UserId) -> SignalingResult<()> {
        if neu.ist_leer() {
            return Err(SignalingError::parameter("neue Benutzer-ID ist leer"));
        }
        if *alt == neu {
            return Ok(());
        }

        let mut inner = self.inner.lock();
        if inner.users.contains_key(&neu) {
            return Err(SignalingError::UserIdVergeben(neu.0));
        }
        if !inner.ist_live(alt) {
            return Err(SignalingError::BenutzerNichtGefunden(alt.0.clone()));
        }
        let Some(mut user) = inner.users.remove(alt) else {
            return Err(SignalingError::BenutzerNichtGefunden(alt.0.clone()));
        };
        user.user_id = neu.clone();

        inner.sockets.insert(user.socket.id().clone(), neu.clone());

        for peer in user.connected_with.keys() {
            if let Some(gegenseite) = inner.users.get_mut(peer) {
                if gegenseite.connected_with.remove(alt).is_some() {
                    gegenseite
                        .connected_with
                        .insert(neu.clone(), user.socket.clone());
                }
            }
        }

        if let Some(room_id) = &user.room_id {
            if let Some(room) = inner.rooms.get_mut(room_id) {
                for teilnehmer in room.participants.iter_mut() {
                    if teilnehmer == alt {
                        *teilnehmer = neu.clone();
                    }
                }
                if room.owner == *alt {
                    room.owner = neu.clone();
                }
            }
        }

        inner.users.insert(neu.clone(), user);
        tracing::info!(alt = %alt, neu = %neu, "Benutzer umbenannt");
        Ok(())
    }

    /// Registriert ein Custom-Event; `true` nur bei der ersten Registrierung
    pub fn custom_event_registrieren(&self, user_id: &UserId, name: &str) -> SignalingResult<bool> {
        let mut inner = self.inner.lock();
        let user = inner
            .live_mut(user_id)
            .ok_or_else(|| SignalingError::BenutzerNichtGefunden(user_id.0.clone()))?;
        Ok(user.custom_events.insert(name.to_string()))
    }

    /// Alle anderen lebenden Benutzer (Empfaenger eines Custom-Events)
    pub fn custom_event_empfaenger(&self, user_id: &UserId) -> Vec<SocketHandle> {
        let inner = self.inner.lock();
        inner
            .users
            .values()
            .filter(|u| !u.abmeldend && u.user_id != *user_id)
            .map(|u| u.socket.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Raeume
    // -----------------------------------------------------------------------

    /// Oeffnet einen Raum mit dem Benutzer als Besitzer
    ///
    /// Ein bestehender Raum mit anderen Teilnehmern gilt als belegt. Der
    /// bisherige Raum des Benutzers wird im selben Schritt verlassen; das
    /// Ergebnis dieses Verlassens wird zurueckgegeben.
    pub fn raum_erstellen(
        &self,
        user_id: &UserId,
        anfrage: RaumOeffnen,
    ) -> SignalingResult<Option<Entfernung>> {
        if anfrage.room_id.ist_leer() {
            return Err(SignalingError::parameter("Raum-ID ist leer"));
        }

        let mut inner = self.inner.lock();
        let (max_teilnehmer, custom_event) = match inner.live(user_id) {
            Some(u) => (u.max_participants_allowed, u.custom_event.clone()),
            None => return Err(SignalingError::BenutzerNichtGefunden(user_id.0.clone())),
        };

        if let Some(room) = inner.rooms.get(&anfrage.room_id) {
            if room.participants.iter().any(|p| p != user_id) {
                return Err(SignalingError::RaumBelegt(anfrage.room_id.0));
            }
        }

        let verlassen = inner.aktuellen_raum_verlassen(user_id, &anfrage.room_id);
        // Eigener, sonst leerer Raum gleicher ID wird neu angelegt
        inner.raum_entfernen(&anfrage.room_id);

        inner.raum_seq += 1;
        let seq = inner.raum_seq;
        let room = Room {
            session_id: anfrage.room_id.clone(),
            owner: user_id.clone(),
            participants: vec![user_id.clone()],
            max_participants_allowed: max_teilnehmer,
            password: passwort_normalisieren(anfrage.password),
            identifier: anfrage.identifier,
            session: anfrage.session,
            extra: anfrage.extra,
            socket_custom_event: custom_event,
            created_at: Utc::now(),
            seq,
        };
        inner.rooms.insert(anfrage.room_id.clone(), room);
        if let Some(user) = inner.live_mut(user_id) {
            user.room_id = Some(anfrage.room_id.clone());
            if let Some(extra) = anfrage.benutzer_extra {
                user.extra = extra;
            }
        }

        tracing::info!(
            room_id = %anfrage.room_id,
            owner = %user_id,
            max_teilnehmer,
            "Raum erstellt"
        );
        Ok(verlassen)
    }

    /// Tritt einem Raum bei
    ///
    /// Pruefreihenfolge: Raum vorhanden, schon Mitglied (Erfolg ohne
    /// Aenderung), Kapazitaet, Passwort.
    pub fn raum_beitreten(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
        password: Option<&str>,
        extra: Option<Value>,
    ) -> SignalingResult<Option<Entfernung>> {
        let mut inner = self.inner.lock();
        if !inner.ist_live(user_id) {
            return Err(SignalingError::BenutzerNichtGefunden(user_id.0.clone()));
        }

        let room = inner
            .rooms
            .get(room_id)
            .filter(|r| !r.participants.is_empty())
            .ok_or_else(|| SignalingError::RaumNichtVerfuegbar(room_id.0.clone()))?;

        let schon_mitglied = room.participants.contains(user_id);
        if !schon_mitglied {
            if room.ist_voll() {
                return Err(SignalingError::RaumVoll(room_id.0.clone()));
            }
            if let Some(erwartet) = &room.password {
                if password != Some(erwartet.as_str()) {
                    return Err(SignalingError::UngueltigesPasswort);
                }
            }
        }

        let verlassen = inner.aktuellen_raum_verlassen(user_id, room_id);
        if let Some(room) = inner.rooms.get_mut(room_id) {
            if !room.participants.contains(user_id) {
                room.participants.push(user_id.clone());
            }
        }
        if let Some(user) = inner.live_mut(user_id) {
            user.room_id = Some(room_id.clone());
            if let Some(extra) = extra {
                user.extra = extra;
            }
        }

        if !schon_mitglied {
            tracing::info!(room_id = %room_id, user_id = %user_id, "Raum beigetreten");
        }
        Ok(verlassen)
    }

    /// Entfernt einen Teilnehmer aus einem Raum
    ///
    /// Verlaesst der Besitzer den Raum, wird er geloescht wenn `erzwingen`
    /// gesetzt ist, der Besitzer `autoCloseEntireSession` angefragt hat, der
    /// Raum ein Einweg-Raum ist oder kein lebender Teilnehmer mehr bleibt.
    /// Sonst erhaelt der erste lebende Teilnehmer den Besitz.
    pub fn teilnehmer_entfernen(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        erzwingen: bool,
    ) -> Entfernung {
        self.inner.lock().entfernen(room_id, user_id, erzwingen)
    }

    /// Entfernt einen Benutzer aus seinem aktuellen Raum (auch waehrend der Abmeldung)
    pub fn raum_verlassen(&self, user_id: &UserId, erzwingen: bool) -> Entfernung {
        let mut inner = self.inner.lock();
        let Some(room_id) = inner.users.get(user_id).and_then(|u| u.room_id.clone()) else {
            return Entfernung::NichtImRaum;
        };
        inner.entfernen(&room_id, user_id, erzwingen)
    }

    /// Schliesst den Raum des Benutzers vollstaendig (nur Besitzer)
    pub fn sitzung_schliessen(&self, user_id: &UserId) -> SignalingResult<Entfernung> {
        let mut inner = self.inner.lock();
        let room_id = inner
            .live(user_id)
            .and_then(|u| u.room_id.clone())
            .ok_or(SignalingError::KeinRaum)?;
        let ist_besitzer = inner
            .rooms
            .get(&room_id)
            .is_some_and(|r| r.owner == *user_id);
        if !ist_besitzer {
            return Err(SignalingError::ZugriffVerweigert(
                "nur der Besitzer kann die Sitzung schliessen".into(),
            ));
        }
        Ok(inner.entfernen(&room_id, user_id, true))
    }

    /// Loescht einen Raum sofort und liefert die ehemaligen, lebenden Teilnehmer
    pub fn raum_loeschen(&self, room_id: &RoomId) -> Option<Vec<(UserId, SocketHandle)>> {
        let mut inner = self.inner.lock();
        let room = inner.raum_entfernen(room_id)?;
        Some(
            room.participants
                .iter()
                .filter_map(|p| inner.live(p).map(|u| (p.clone(), u.socket.clone())))
                .collect(),
        )
    }

    /// Setzt das Raum-Passwort (nur Besitzer, leer entfernt das Passwort)
    pub fn passwort_setzen(&self, user_id: &UserId, password: Option<String>) -> SignalingResult<()> {
        let mut inner = self.inner.lock();
        let room_id = inner
            .live(user_id)
            .and_then(|u| u.room_id.clone())
            .ok_or(SignalingError::KeinRaum)?;
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| SignalingError::RaumNichtVerfuegbar(room_id.0.clone()))?;
        if room.owner != *user_id {
            return Err(SignalingError::ZugriffVerweigert(
                "nur der Besitzer kann das Passwort setzen".into(),
            ));
        }
        room.password = passwort_normalisieren(password);
        tracing::debug!(room_id = %room_id, geschuetzt = room.hat_passwort(), "Raum-Passwort geaendert");
        Ok(())
    }

    /// Prueft ein Raum-Passwort; `None` wenn der Raum keines hat
    pub fn passwort_pruefen(&self, room_id: &RoomId, password: &str) -> SignalingResult<Option<bool>> {
        let inner = self.inner.lock();
        let room = inner
            .rooms
            .get(room_id)
            .ok_or_else(|| SignalingError::RaumNichtVerfuegbar(room_id.0.clone()))?;
        Ok(room.password.as_ref().map(|p| p == password))
    }

    /// Alle Raeume mit passendem oeffentlichen Bezeichner, in Erstellreihenfolge
    pub fn oeffentliche_raeume(&self, identifier: &str) -> Vec<PublicRoom> {
        let inner = self.inner.lock();
        inner
            .raeume_sortiert()
            .into_iter()
            .filter(|r| !r.identifier.is_empty() && r.identifier == identifier)
            .map(|r| PublicRoom {
                sessionid: r.session_id.clone(),
                owner: r.owner.clone(),
                participants: r.participants.clone(),
                max_participants_allowed: r.max_participants_allowed,
                session: r.session,
                extra: r.extra.clone(),
                is_full: r.ist_voll(),
                is_password_protected: r.hat_passwort(),
            })
            .collect()
    }

    /// Existiert der Raum mit Teilnehmern? Dazu seine Zusatzdaten mit `_room`-Status
    pub fn praesenz_pruefen(&self, room_id: &RoomId) -> (bool, Value) {
        let inner = self.inner.lock();
        let Some(room) = inner.rooms.get(room_id).filter(|r| !r.participants.is_empty()) else {
            return (false, Value::Object(Map::new()));
        };
        let mut extra = match &room.extra {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        extra.insert(
            "_room".to_string(),
            json!({
                "isFull": room.ist_voll(),
                "isPasswordProtected": room.hat_passwort(),
            }),
        );
        (true, Value::Object(extra))
    }

    /// Daten fuer die Vorstellung eines Beitretenden an einen Raum
    pub fn raum_einfuehrung(&self, joiner: &UserId, room_id: &RoomId) -> Option<Einfuehrung> {
        let inner = self.inner.lock();
        let room = inner.rooms.get(room_id)?;
        Some(Einfuehrung {
            owner: room.owner.clone(),
            einweg: room.session.ist_einweg(),
            teilnehmer: room
                .participants
                .iter()
                .filter(|p| *p != joiner)
                .cloned()
                .collect(),
        })
    }

    /// Existiert ein Raum mit dieser ID?
    pub fn ist_raum(&self, room_id: &RoomId) -> bool {
        self.inner.lock().rooms.contains_key(room_id)
    }

    // -----------------------------------------------------------------------
    // Paarungen
    // -----------------------------------------------------------------------

    /// Paart zwei lebende Benutzer in beide Richtungen
    pub fn paaren(&self, a: &UserId, b: &UserId) -> Paarung {
        let mut inner = self.inner.lock();
        let (Some(socket_a), Some(socket_b)) = (
            inner.live(a).map(|u| u.socket.clone()),
            inner.live(b).map(|u| u.socket.clone()),
        ) else {
            return Paarung::Unbekannt;
        };

        let bestand = inner
            .users
            .get(a)
            .is_some_and(|u| u.connected_with.contains_key(b));

        if let Some(user_b) = inner.users.get_mut(b) {
            user_b.connected_with.entry(a.clone()).or_insert_with(|| socket_a.clone());
        }
        if bestand {
            return Paarung::Bestehend;
        }
        if let Some(user_a) = inner.users.get_mut(a) {
            user_a.connected_with.insert(b.clone(), socket_b.clone());
        }

        tracing::debug!(a = %a, b = %b, "Benutzer gepaart");
        Paarung::Neu { socket_a, socket_b }
    }

    /// Ziel einer Weiterleitung, falls Sender und Ziel gepaart sind
    pub fn relay_ziel(&self, sender: &UserId, ziel: &UserId) -> Option<RelayZiel> {
        let inner = self.inner.lock();
        let absender = inner.live(sender)?;
        if !absender.connected_with.contains_key(ziel) {
            return None;
        }
        let empfaenger = inner.live(ziel)?;
        Some(RelayZiel {
            socket: empfaenger.socket.clone(),
            message_event: empfaenger.message_event.clone(),
            sender_extra: absender.extra.clone(),
        })
    }

    /// Loest eine Paarung in beide Richtungen
    ///
    /// Liefert den Socket der Gegenseite nur, wenn tatsaechlich eine Paarung
    /// bestand.
    pub fn paarung_trennen(&self, user_id: &UserId, remote: &UserId) -> Option<SocketHandle> {
        let mut inner = self.inner.lock();
        let entfernt = inner
            .users
            .get_mut(user_id)
            .and_then(|u| u.connected_with.remove(remote));
        if let Some(gegenseite) = inner.users.get_mut(remote) {
            gegenseite.connected_with.remove(user_id);
        }
        entfernt?;
        tracing::debug!(user_id = %user_id, remote = %remote, "Paarung getrennt");
        inner.live(remote).map(|u| u.socket.clone())
    }

    // -----------------------------------------------------------------------
    // Abmeldung
    // -----------------------------------------------------------------------

    /// Beansprucht eine Verbindung fuer die Bereinigung
    ///
    /// Liefert den Benutzer genau einmal pro Socket; danach gilt er nicht
    /// mehr als lebendig.
    pub fn abmeldung_beanspruchen(&self, socket_id: &SocketId) -> Option<(UserId, SocketHandle)> {
        let mut inner = self.inner.lock();
        let user_id = inner.sockets.remove(socket_id)?;
        let user = inner.users.get_mut(&user_id)?;
        if user.abmeldend || user.socket.id() != socket_id {
            return None;
        }
        user.abmeldend = true;
        Some((user_id, user.socket.clone()))
    }

    /// Loest alle Paarungen eines Benutzers und liefert die ehemaligen Gegenseiten
    pub fn paarungen_aufloesen(&self, user_id: &UserId) -> Vec<(UserId, SocketHandle)> {
        let mut inner = self.inner.lock();
        let Some(user) = inner.users.get_mut(user_id) else {
            return Vec::new();
        };
        let peers: Vec<(UserId, SocketHandle)> = user.connected_with.drain().collect();
        for (peer, _) in &peers {
            if let Some(gegenseite) = inner.users.get_mut(peer) {
                gegenseite.connected_with.remove(user_id);
            }
        }
        peers
    }

    /// Loescht den Datensatz eines Benutzers, sofern er zur Verbindung gehoert
    pub fn benutzer_entfernen(&self, user_id: &UserId, socket_id: &SocketId) -> bool {
        let mut inner = self.inner.lock();
        let gehoert_dazu = inner
            .users
            .get(user_id)
            .is_some_and(|u| u.socket.id() == socket_id);
        if !gehoert_dazu {
            return false;
        }
        inner.users.remove(user_id);
        inner.sockets.remove(socket_id);
        tracing::info!(user_id = %user_id, "Benutzer entfernt");
        true
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Alle lebenden Sockets
    pub fn alle_sockets(&self) -> Vec<SocketHandle> {
        let inner = self.inner.lock();
        inner
            .users
            .values()
            .filter(|u| !u.abmeldend)
            .map(|u| u.socket.clone())
            .collect()
    }

    /// Snapshot eines Benutzers
    pub fn benutzer_info(&self, user_id: &UserId) -> Option<UserInfo> {
        let inner = self.inner.lock();
        inner.live(user_id).map(DirectoryInner::user_info)
    }

    /// Snapshot aller lebenden Benutzer, nach ID sortiert
    pub fn benutzer_liste(&self) -> Vec<UserInfo> {
        let inner = self.inner.lock();
        let mut liste: Vec<UserInfo> = inner
            .users
            .values()
            .filter(|u| !u.abmeldend)
            .map(DirectoryInner::user_info)
            .collect();
        liste.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        liste
    }

    /// Snapshot eines Raums
    pub fn raum_info(&self, room_id: &RoomId) -> Option<RoomInfo> {
        let inner = self.inner.lock();
        inner.rooms.get(room_id).map(DirectoryInner::room_info)
    }

    /// Snapshot aller Raeume in Erstellreihenfolge
    pub fn raum_liste(&self) -> Vec<RoomInfo> {
        let inner = self.inner.lock();
        inner
            .raeume_sortiert()
            .into_iter()
            .map(DirectoryInner::room_info)
            .collect()
    }

    /// Anzahl lebender Benutzer
    pub fn anzahl_benutzer(&self) -> usize {
        self.inner.lock().users.values().filter(|u| !u.abmeldend).count()
    }

    /// Anzahl offener Raeume
    pub fn anzahl_raeume(&self) -> usize {
        self.inner.lock().rooms.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::ChannelSocket;
    use serde_json::json;

    fn benutzer(dir: &RoomDirectory, id: &str, max: usize) -> SocketHandle {
        let (socket, _rx) = ChannelSocket::neu(SocketId::from(format!("s-{id}").as_str()));
        let handle: SocketHandle = socket;
        dir.benutzer_registrieren(NeuerBenutzer {
            user_id: UserId::from(id),
            socket: handle.clone(),
            extra: json!({}),
            message_event: "RTCMultiConnection-Message".into(),
            custom_event: None,
            session_id: RoomId::from(id),
            auto_close_entire_session: false,
            max_participants_allowed: max,
        })
        .unwrap();
        handle
    }

    fn oeffnen(dir: &RoomDirectory, user: &str, raum: &str) {
        dir.raum_erstellen(
            &UserId::from(user),
            RaumOeffnen::neu(RoomId::from(raum)),
        )
        .unwrap();
    }

    #[test]
    fn doppelte_user_id_abgelehnt() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        let (socket, _rx) = ChannelSocket::neu(SocketId::from("s-x"));
        let ergebnis = dir.benutzer_registrieren(NeuerBenutzer {
            user_id: UserId::from("u1"),
            socket,
            extra: json!({}),
            message_event: "m".into(),
            custom_event: None,
            session_id: RoomId::from("x"),
            auto_close_entire_session: false,
            max_participants_allowed: 10,
        });
        assert!(matches!(ergebnis, Err(SignalingError::UserIdVergeben(_))));
    }

    #[test]
    fn raum_belegt_durch_andere_teilnehmer() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        benutzer(&dir, "u2", 10);
        oeffnen(&dir, "u1", "r1");

        let ergebnis = dir.raum_erstellen(
            &UserId::from("u2"),
            RaumOeffnen::neu(RoomId::from("r1")),
        );
        assert!(matches!(ergebnis, Err(SignalingError::RaumBelegt(_))));
        assert_eq!(dir.raum_info(&RoomId::from("r1")).unwrap().owner, UserId::from("u1"));
    }

    #[test]
    fn beitritt_ist_idempotent() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        benutzer(&dir, "u2", 10);
        oeffnen(&dir, "u1", "r1");
        let r1 = RoomId::from("r1");

        dir.raum_beitreten(&UserId::from("u2"), &r1, None, None).unwrap();
        dir.raum_beitreten(&UserId::from("u2"), &r1, None, None).unwrap();
        assert_eq!(
            dir.raum_info(&r1).unwrap().participants,
            vec![UserId::from("u1"), UserId::from("u2")]
        );
    }

    #[test]
    fn voller_raum_vor_passwort_geprueft() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 1);
        benutzer(&dir, "u2", 10);
        dir.raum_erstellen(
            &UserId::from("u1"),
            RaumOeffnen {
                password: Some("pw".into()),
                ..RaumOeffnen::neu(RoomId::from("r1"))
            },
        )
        .unwrap();

        let ergebnis = dir.raum_beitreten(&UserId::from("u2"), &RoomId::from("r1"), Some("falsch"), None);
        assert!(matches!(ergebnis, Err(SignalingError::RaumVoll(_))));
    }

    #[test]
    fn unbekannter_raum_nicht_verfuegbar() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        let ergebnis = dir.raum_beitreten(&UserId::from("u1"), &RoomId::from("fehlt"), None, None);
        assert!(matches!(ergebnis, Err(SignalingError::RaumNichtVerfuegbar(_))));
    }

    #[test]
    fn raumwechsel_verlaesst_alten_raum() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        benutzer(&dir, "u2", 10);
        oeffnen(&dir, "u1", "r1");
        oeffnen(&dir, "u2", "r2");

        let verlassen = dir
            .raum_beitreten(&UserId::from("u2"), &RoomId::from("r1"), None, None)
            .unwrap();
        assert!(matches!(verlassen, Some(Entfernung::RaumGeloescht { .. })));
        assert!(!dir.ist_raum(&RoomId::from("r2")));
        assert_eq!(dir.raum_von(&UserId::from("u2")), Some(RoomId::from("r1")));
    }

    #[test]
    fn einweg_raum_wird_bei_besitzer_weggang_geloescht() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        benutzer(&dir, "u2", 10);
        dir.raum_erstellen(
            &UserId::from("u1"),
            RaumOeffnen {
                session: SessionFlags {
                    broadcast: true,
                    ..Default::default()
                },
                ..RaumOeffnen::neu(RoomId::from("r1"))
            },
        )
        .unwrap();
        dir.raum_beitreten(&UserId::from("u2"), &RoomId::from("r1"), None, None)
            .unwrap();

        let ergebnis = dir.raum_verlassen(&UserId::from("u1"), false);
        assert!(matches!(ergebnis, Entfernung::RaumGeloescht { .. }));
        assert_eq!(dir.raum_von(&UserId::from("u2")), None);
    }

    #[test]
    fn besitz_geht_an_ersten_lebenden_teilnehmer() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        let s2 = benutzer(&dir, "u2", 10);
        benutzer(&dir, "u3", 10);
        oeffnen(&dir, "u1", "r1");
        let r1 = RoomId::from("r1");
        dir.raum_beitreten(&UserId::from("u2"), &r1, None, None).unwrap();
        dir.raum_beitreten(&UserId::from("u3"), &r1, None, None).unwrap();

        // u2 meldet sich gerade ab und kommt nicht mehr in Frage
        dir.abmeldung_beanspruchen(s2.id()).unwrap();

        match dir.raum_verlassen(&UserId::from("u1"), false) {
            Entfernung::BesitzUebertragen { neuer_besitzer, .. } => {
                assert_eq!(neuer_besitzer, UserId::from("u3"));
            }
            anderes => panic!("Erwartet Besitzuebertragung, erhalten: {anderes:?}"),
        }
        let info = dir.raum_info(&r1).unwrap();
        assert_eq!(info.owner, UserId::from("u3"));
        assert!(info.participants.contains(&info.owner));
    }

    #[test]
    fn passwort_nur_durch_besitzer() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        benutzer(&dir, "u2", 10);
        oeffnen(&dir, "u1", "r1");
        let r1 = RoomId::from("r1");
        dir.raum_beitreten(&UserId::from("u2"), &r1, None, None).unwrap();

        let ergebnis = dir.passwort_setzen(&UserId::from("u2"), Some("geheim".into()));
        assert!(matches!(ergebnis, Err(SignalingError::ZugriffVerweigert(_))));

        dir.passwort_setzen(&UserId::from("u1"), Some("geheim".into())).unwrap();
        assert_eq!(dir.passwort_pruefen(&r1, "geheim").unwrap(), Some(true));
        assert_eq!(dir.passwort_pruefen(&r1, "nein").unwrap(), Some(false));

        dir.passwort_setzen(&UserId::from("u1"), Some(String::new())).unwrap();
        assert_eq!(dir.passwort_pruefen(&r1, "geheim").unwrap(), None);
    }

    #[test]
    fn oeffentliche_raeume_in_erstellreihenfolge() {
        let dir = RoomDirectory::neu();
        for (user, raum) in [("u1", "zeta"), ("u2", "alpha"), ("u3", "privat")] {
            benutzer(&dir, user, 1);
            dir.raum_erstellen(
                &UserId::from(user),
                RaumOeffnen {
                    identifier: if raum == "privat" { String::new() } else { "lobby".into() },
                    ..RaumOeffnen::neu(RoomId::from(raum))
                },
            )
            .unwrap();
        }

        let raeume = dir.oeffentliche_raeume("lobby");
        let ids: Vec<&str> = raeume.iter().map(|r| r.sessionid.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
        assert!(raeume[0].is_full, "Kapazitaet 1 mit Besitzer ist voll");
        assert!(!raeume[0].is_password_protected);
    }

    #[test]
    fn praesenz_mit_raumstatus() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        dir.raum_erstellen(
            &UserId::from("u1"),
            RaumOeffnen {
                password: Some("pw".into()),
                extra: json!({"thema": "demo"}),
                ..RaumOeffnen::neu(RoomId::from("r1"))
            },
        )
        .unwrap();

        let (vorhanden, extra) = dir.praesenz_pruefen(&RoomId::from("r1"));
        assert!(vorhanden);
        assert_eq!(extra["thema"], "demo");
        assert_eq!(extra["_room"]["isPasswordProtected"], true);
        assert_eq!(extra["_room"]["isFull"], false);

        assert!(!dir.praesenz_pruefen(&RoomId::from("r2")).0);
    }

    #[test]
    fn paarung_genau_einmal_neu() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "a", 10);
        benutzer(&dir, "b", 10);
        let (a, b) = (UserId::from("a"), UserId::from("b"));

        assert!(matches!(dir.paaren(&a, &b), Paarung::Neu { .. }));
        assert!(matches!(dir.paaren(&a, &b), Paarung::Bestehend));
        assert!(matches!(dir.paaren(&b, &a), Paarung::Bestehend));
        assert!(dir.relay_ziel(&a, &b).is_some());
        assert!(dir.relay_ziel(&b, &a).is_some());

        assert!(dir.paarung_trennen(&a, &b).is_some());
        assert!(dir.relay_ziel(&a, &b).is_none());
        assert!(dir.relay_ziel(&b, &a).is_none());
        assert!(dir.paarung_trennen(&a, &b).is_none());
    }

    #[test]
    fn umbenennen_verschiebt_alle_referenzen() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "alt", 10);
        benutzer(&dir, "peer", 10);
        oeffnen(&dir, "alt", "r1");
        dir.raum_beitreten(&UserId::from("peer"), &RoomId::from("r1"), None, None)
            .unwrap();
        dir.paaren(&UserId::from("alt"), &UserId::from("peer"));

        dir.benutzer_umbenennen(&UserId::from("alt"), UserId::from("neu"))
            .unwrap();

        assert!(!dir.ist_live(&UserId::from("alt")));
        assert!(dir.ist_live(&UserId::from("neu")));
        assert_eq!(
            dir.user_von_socket(&SocketId::from("s-alt")),
            Some(UserId::from("neu"))
        );
        let raum = dir.raum_info(&RoomId::from("r1")).unwrap();
        assert_eq!(raum.owner, UserId::from("neu"));
        assert_eq!(raum.participants[0], UserId::from("neu"));
        let peer = dir.benutzer_info(&UserId::from("peer")).unwrap();
        assert_eq!(peer.connected_with, vec![UserId::from("neu")]);
    }

    #[test]
    fn umbenennen_auf_vergebene_id_scheitert() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "a", 10);
        benutzer(&dir, "b", 10);
        let ergebnis = dir.benutzer_umbenennen(&UserId::from("a"), UserId::from("b"));
        assert!(matches!(ergebnis, Err(SignalingError::UserIdVergeben(_))));
        let ergebnis = dir.benutzer_umbenennen(&UserId::from("a"), UserId::from("  "));
        assert!(matches!(ergebnis, Err(SignalingError::UngueltigeParameter(_))));
    }

    #[test]
    fn extra_empfaenger_ohne_duplikate() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        benutzer(&dir, "u2", 10);
        benutzer(&dir, "u3", 10);
        oeffnen(&dir, "u1", "r1");
        dir.raum_beitreten(&UserId::from("u2"), &RoomId::from("r1"), None, None)
            .unwrap();
        dir.paaren(&UserId::from("u1"), &UserId::from("u2"));
        dir.paaren(&UserId::from("u1"), &UserId::from("u3"));

        let empfaenger = dir
            .extra_aktualisieren(&UserId::from("u1"), json!({"name": "neu"}))
            .unwrap();
        let mut ids: Vec<String> = empfaenger.into_iter().map(|(id, _)| id.0).collect();
        ids.sort();
        assert_eq!(ids, vec!["u2", "u3"]);
        assert_eq!(dir.raum_info(&RoomId::from("r1")).unwrap().extra, json!({"name": "neu"}));
    }

    #[test]
    fn abmeldung_nur_einmal_beanspruchbar() {
        let dir = RoomDirectory::neu();
        let s1 = benutzer(&dir, "u1", 10);
        assert!(dir.abmeldung_beanspruchen(s1.id()).is_some());
        assert!(dir.abmeldung_beanspruchen(s1.id()).is_none());
        assert!(!dir.ist_live(&UserId::from("u1")));
        assert!(dir.benutzer_entfernen(&UserId::from("u1"), s1.id()));
        assert_eq!(dir.anzahl_benutzer(), 0);
    }

    #[test]
    fn custom_event_dedupliziert() {
        let dir = RoomDirectory::neu();
        benutzer(&dir, "u1", 10);
        let u1 = UserId::from("u1");
        assert!(dir.custom_event_registrieren(&u1, "chat").unwrap());
        assert!(!dir.custom_event_registrieren(&u1, "chat").unwrap());
        assert_eq!(dir.event_zuordnen(&u1, "chat"), Some(EventArt::Custom));
        assert_eq!(
            dir.event_zuordnen(&u1, "RTCMultiConnection-Message"),
            Some(EventArt::Nachricht)
        );
        assert_eq!(dir.event_zuordnen(&u1, "anderes"), None);
    }
}
