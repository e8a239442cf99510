//! Gemeinsamer Server-Zustand fuer den Relay-Service
//!
//! Haelt alle geteilten Zustands-Manager als eine Arc-Referenz, die
//! sicher zwischen tokio-Tasks geteilt werden kann. Saemtlicher Zustand
//! ist fluechtig; ein Prozess-Neustart leert Presence, Warteschlange,
//! Sitzungen und Meldungszaehler.

use blinddate_matching::{
    ModerationsLedger, PresenceRegistry, SessionManager, WarteSchlange, WortFilter,
    STANDARD_MELDE_SCHWELLE,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Konfiguration fuer den Relay-Service
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Maximale gleichzeitige Clients
    pub max_clients: u32,
    /// Timeout fuer unvermittelte Wartetickets in Sekunden
    pub warte_timeout_sek: u64,
    /// Anzahl Meldungen ab der eine Identitaet gebannt wird
    pub melde_schwelle: u32,
    /// Woerter die in Chat-Nachrichten maskiert werden
    pub wortliste: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_name: "Blinddate Server".to_string(),
            max_clients: 512,
            warte_timeout_sek: 120,
            melde_schwelle: STANDARD_MELDE_SCHWELLE,
            wortliste: Vec::new(),
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
///
/// Alle Manager teilen ihren inneren Zustand per Clone; der `RelayState`
/// selbst wird als Arc zwischen Listener, Verbindungs-Tasks und
/// Observability geteilt.
pub struct RelayState {
    /// Server-Konfiguration
    pub config: Arc<RelayConfig>,
    /// Presence-Registry (Wer ist verbunden, Send-Queues)
    pub presence: PresenceRegistry,
    /// Wortfilter fuer Chat-Nachrichten
    pub filter: WortFilter,
    /// Meldungszaehler und Bann-Entscheidung
    pub moderation: ModerationsLedger,
    /// Wartepool mit Paarungs-Algorithmus
    pub schlange: WarteSchlange,
    /// Paarungs-Map aktiver Sitzungen
    pub sitzungen: SessionManager,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig) -> Arc<Self> {
        let filter = WortFilter::neu(&config.wortliste);
        let moderation = ModerationsLedger::mit_schwelle(config.melde_schwelle);
        let sitzungen = SessionManager::neu();
        let schlange = WarteSchlange::neu(
            moderation.clone(),
            sitzungen.clone(),
            Duration::from_secs(config.warte_timeout_sek),
        );

        Arc::new(Self {
            config: Arc::new(config),
            presence: PresenceRegistry::neu(),
            filter,
            moderation,
            schlange,
            sitzungen,
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
