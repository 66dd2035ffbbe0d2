//! Fehlertypen fuer den Signaling-Service
//!
//! Fehler verlassen nie einen Handler: der Router wandelt sie in eine
//! Completion `(false, meldung)` fuer den anfragenden Client um.

use signalhub_protocol::meldungen;
use thiserror::Error;

/// Fehlerklasse, nach der Handler und Logging unterscheiden
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FehlerKategorie {
    /// Fehlende oder ungueltige Parameter
    Validierung,
    /// Zustandskonflikt (Raum voll, ID vergeben, keine Berechtigung)
    Konflikt,
    /// Unbekannter Raum oder Benutzer
    NichtGefunden,
    /// Senden an einen als lebendig geltenden Socket fehlgeschlagen
    Transport,
    /// Heartbeat hat alle Versuche ausgeschoepft
    Lebendigkeit,
}

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Ungueltige oder fehlende Parameter
    #[error("Ungueltige Parameter: {0}")]
    UngueltigeParameter(String),

    /// Raum existiert bereits und hat Teilnehmer
    #[error("Raum {0} ist bereits belegt")]
    RaumBelegt(String),

    /// Raum hat die maximale Teilnehmerzahl erreicht
    #[error("Raum {0} ist voll")]
    RaumVoll(String),

    /// Raum-Passwort fehlt oder falsch
    #[error("Raum-Passwort falsch")]
    UngueltigesPasswort,

    /// Benutzer-ID ist bereits an einen lebenden Benutzer vergeben
    #[error("Benutzer-ID {0} ist bereits vergeben")]
    UserIdVergeben(String),

    /// Aktion ist dem Raum-Besitzer vorbehalten
    #[error("Berechtigung verweigert: {0}")]
    ZugriffVerweigert(String),

    /// Raum existiert nicht
    #[error("Raum {0} nicht verfuegbar")]
    RaumNichtVerfuegbar(String),

    /// Benutzer existiert nicht
    #[error("Benutzer {0} nicht gefunden")]
    BenutzerNichtGefunden(String),

    /// Benutzer ist in keinem Raum
    #[error("Benutzer ist in keinem Raum")]
    KeinRaum,

    /// Senden an Client fehlgeschlagen (Queue voll oder geschlossen)
    #[error("Senden fehlgeschlagen: {0}")]
    SendFehler(String),

    /// Heartbeat hat die Verbindung aufgegeben
    #[error("Verbindung verloren nach {0} Fehlversuchen")]
    VerbindungVerloren(u32),

    /// Protokollfehler (ungueltiges Frame, falscher Zustand)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    /// Erstellt einen Validierungsfehler
    pub fn parameter(msg: impl Into<String>) -> Self {
        Self::UngueltigeParameter(msg.into())
    }

    /// Ordnet den Fehler einer Fehlerklasse zu
    pub fn kategorie(&self) -> FehlerKategorie {
        match self {
            Self::UngueltigeParameter(_) | Self::Protokoll(_) => FehlerKategorie::Validierung,
            Self::RaumBelegt(_)
            | Self::RaumVoll(_)
            | Self::UngueltigesPasswort
            | Self::UserIdVergeben(_)
            | Self::ZugriffVerweigert(_) => FehlerKategorie::Konflikt,
            Self::RaumNichtVerfuegbar(_) | Self::BenutzerNichtGefunden(_) | Self::KeinRaum => {
                FehlerKategorie::NichtGefunden
            }
            Self::Io(_) | Self::SendFehler(_) | Self::Intern(_) => FehlerKategorie::Transport,
            Self::VerbindungVerloren(_) => FehlerKategorie::Lebendigkeit,
        }
    }

    /// Fehlertext, den der Client in der Completion erhaelt
    pub fn client_meldung(&self) -> &'static str {
        match self {
            Self::UngueltigeParameter(_) | Self::Protokoll(_) => meldungen::INVALID_REQUEST,
            // Ein belegter Raum ist fuer den Oeffnenden nicht verfuegbar
            Self::RaumBelegt(_) | Self::RaumNichtVerfuegbar(_) => meldungen::ROOM_NOT_AVAILABLE,
            Self::RaumVoll(_) => meldungen::ROOM_FULL,
            Self::UngueltigesPasswort => meldungen::INVALID_PASSWORD,
            Self::UserIdVergeben(_) => meldungen::USERID_ALREADY_TAKEN,
            Self::ZugriffVerweigert(_) => meldungen::ROOM_PERMISSION_DENIED,
            Self::BenutzerNichtGefunden(_) => meldungen::USERID_NOT_AVAILABLE,
            Self::KeinRaum => meldungen::DID_NOT_JOIN_ANY_ROOM,
            Self::Io(_) | Self::SendFehler(_) | Self::VerbindungVerloren(_) | Self::Intern(_) => {
                meldungen::INTERNAL_ERROR
            }
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
