//! Steuerungs-Ereignisse zwischen Client und Server
//!
//! Beide Richtungen sind tagged Enums mit `event`/`data`-Feldern, sodass
//! ein Browser-Client die Frames direkt auf seine Ereignisnamen mappen
//! kann. Die Handshake-Payloads (SDP-Offer/-Answer, ICE-Kandidaten)
//! werden als opake `serde_json::Value` transportiert – der Server
//! inspiziert sie nicht.

use blinddate_core::types::IdentityId;
use chrono::Utc;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Verhandlungsrolle
// ---------------------------------------------------------------------------

/// Deterministische Rolle fuer die Glare-Aufloesung
///
/// Bei gleichzeitigen Offers beider Seiten gibt die hoefliche Seite nach
/// und die unhoefliche gewinnt. Die Rolle wird einmalig bei der
/// Sitzungserstellung aus den beiden Identitaets-Tokens berechnet und an
/// beide Seiten kommuniziert – serverseitig erzwungen wird sie nicht, da
/// der Handshake selbst aus opaken Payloads besteht.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationRole {
    /// Gibt bei Kollision nach (lexikografisch groesseres Token)
    Polite,
    /// Gewinnt bei Kollision (lexikografisch kleineres Token)
    Impolite,
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Registrierung beim Verbindungsaufbau (erstes Frame jeder Verbindung)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelloRequest {
    /// Opakes Identitaets-Token; fehlt es, erzeugt der Server eines.
    /// Ein Reconnect mit demselben Token ersetzt den alten Eintrag.
    pub id: Option<String>,
    /// Anzeigename, Standard "Stranger"
    pub display_name: Option<String>,
    /// Media-Faehigkeiten (rein informativ)
    #[serde(default)]
    pub video_enabled: bool,
    #[serde(default)]
    pub audio_enabled: bool,
}

/// Signaling-Nachricht an den aktuellen Partner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRequest {
    /// Muss den aktuellen Partner benennen, sonst wird verworfen
    pub to: IdentityId,
    /// Opaker Handshake-Payload, wird unveraendert weitergereicht
    pub payload: serde_json::Value,
}

/// Ereignisse die der Client an den Server sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Registrierung (muss das erste Ereignis der Verbindung sein)
    Hello(HelloRequest),
    /// Partner anfordern bzw. Warteticket ersetzen
    RequestChat {
        #[serde(default)]
        interests: Vec<String>,
    },
    /// Aktuelle Sitzung beenden, ohne neue Vermittlung
    Leave,
    /// SDP-Offer an den Partner
    Offer(SignalRequest),
    /// SDP-Answer an den Partner
    Answer(SignalRequest),
    /// ICE-Kandidat an den Partner
    IceCandidate(SignalRequest),
    /// Chat-Nachricht an den Partner (wird serverseitig gefiltert)
    Message { to: IdentityId, text: String },
    /// Meldung des Gegenuebers an die Moderation
    ReportUser {
        reported_id: IdentityId,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Grund fuer das Ende einer Sitzung aus Sicht des Partners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Der Partner hat die Sitzung aktiv verlassen
    PartnerLeft,
    /// Der Partner wurde nach Meldungen entfernt
    Reported,
    /// Die Verbindung des Partners ist abgerissen
    Disconnected,
}

/// Informationen ueber den vermittelten Partner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairedInfo {
    pub partner_id: IdentityId,
    pub partner_name: String,
    pub partner_interests: Vec<String>,
    /// Eigene Rolle fuer die Glare-Aufloesung
    pub role: NegotiationRole,
}

/// Weitergeleitete Signaling-Nachricht, mit dem Absender getaggt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardedSignal {
    pub from: IdentityId,
    pub payload: serde_json::Value,
}

/// Eine zugestellte Chat-Nachricht (transient, wird nie persistiert)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: IdentityId,
    pub text: String,
    /// RFC3339-Zeitstempel der Zustellung
    pub timestamp: String,
}

impl ChatMessage {
    /// Erstellt eine Chat-Nachricht mit dem aktuellen Zeitstempel
    pub fn neu(sender: IdentityId, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Ereignisse die der Server an den Client sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Bestaetigt die Registrierung mit der effektiven Identitaets-ID
    Welcome { id: IdentityId },
    /// Aktuelle Position im Wartepool (1-indiziert)
    QueuePosition { position: usize },
    /// Kein Partner innerhalb des Timeouts gefunden; Ticket entfernt
    QueueTimeout,
    /// Erfolgreich vermittelt
    Paired(PairedInfo),
    /// Weitergeleitetes SDP-Offer
    Offer(ForwardedSignal),
    /// Weitergeleitete SDP-Answer
    Answer(ForwardedSignal),
    /// Weitergeleiteter ICE-Kandidat
    IceCandidate(ForwardedSignal),
    /// Gefilterte Chat-Nachricht des Partners
    Message(ChatMessage),
    /// Die Sitzung wurde beendet
    Disconnected { reason: DisconnectReason },
    /// Die eigene Identitaet wurde gebannt
    Banned { reason: String },
    /// Verbindungslokaler Fehler (z.B. Ereignis vor dem Hello)
    Error { message: String },
}

impl ServerEvent {
    /// Erstellt ein Fehler-Ereignis
    pub fn fehler(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
