//! Presence-Registry – Verwaltet alle verbundenen Identitaeten
//!
//! Wer ist verbunden, mit welchen Attributen? Die Registry ist eine
//! reine Presence-Map: sie stoesst selbst nie Sitzungs- oder
//! Warteschlangen-Cleanup an. Jeder Eintrag besitzt exklusiv die
//! Send-Queue seiner Verbindung; alle anderen Komponenten referenzieren
//! Identitaeten nur per ID und loesen bei jeder Nutzung neu ueber die
//! Registry auf – Verbindungs-Handles werden nie gecacht.
//!
//! Zustellung ist best-effort: an eine abwesende Identitaet gerichtete
//! Ereignisse werden still verworfen (der Aufrufer hat die Trennung
//! bereits beobachtet oder wird sie gleich beobachten).

use blinddate_core::types::IdentityId;
use blinddate_protocol::control::ServerEvent;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Verbindung
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// IdentityAttribute
// ---------------------------------------------------------------------------

/// Deklarierte Attribute einer verbundenen Identitaet
#[derive(Debug, Clone)]
pub struct IdentityAttribute {
    /// Anzeigename, Standard "Stranger"
    pub anzeige_name: String,
    /// Media-Faehigkeiten (rein informativ)
    pub video_aktiv: bool,
    pub audio_aktiv: bool,
}

impl Default for IdentityAttribute {
    fn default() -> Self {
        Self {
            anzeige_name: "Stranger".to_string(),
            video_aktiv: false,
            audio_aktiv: false,
        }
    }
}

// ---------------------------------------------------------------------------
// PresenceRegistry
// ---------------------------------------------------------------------------

/// Eintrag einer verbundenen Identitaet
struct PresenceEintrag {
    attribute: IdentityAttribute,
    /// Send-Queue der Verbindung; exklusiv im Besitz dieses Eintrags
    tx: mpsc::Sender<ServerEvent>,
    /// Verbindungs-Epoche; unterscheidet einen Reconnect-Nachfolger vom
    /// ersetzten Vorgaenger beim Verbindungs-Cleanup
    epoche: u64,
}

/// Verwaltet alle verbundenen Identitaeten
///
/// Thread-safe via Arc + DashMap. Clone der Registry teilt den inneren
/// Zustand.
#[derive(Clone)]
pub struct PresenceRegistry {
    inner: Arc<PresenceRegistryInner>,
}

struct PresenceRegistryInner {
    /// Alle verbundenen Identitaeten, indiziert nach IdentityId
    clients: DashMap<IdentityId, PresenceEintrag>,
    /// Monotone Quelle fuer Verbindungs-Epochen
    epochen: AtomicU64,
}

impl PresenceRegistry {
    /// Erstellt eine neue PresenceRegistry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(PresenceRegistryInner {
                clients: DashMap::new(),
                epochen: AtomicU64::new(0),
            }),
        }
    }

    /// Registriert eine Identitaet und gibt ihre Empfangs-Queue zurueck
    ///
    /// Der Verbindungs-Task liest aus dieser Queue und sendet via TCP.
    /// Ein bestehender Eintrag mit derselben ID wird ersetzt (impliziter
    /// Reconnect); das Schliessen der alten Send-Queue beendet den
    /// alten Verbindungs-Task. Die zurueckgegebene Epoche identifiziert
    /// diese Verbindung fuer `entfernen_mit_epoche`.
    pub fn registrieren(
        &self,
        id: IdentityId,
        attribute: IdentityAttribute,
    ) -> (mpsc::Receiver<ServerEvent>, u64) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let epoche = self.inner.epochen.fetch_add(1, Ordering::Relaxed);
        let ersetzt = self
            .inner
            .clients
            .insert(
                id.clone(),
                PresenceEintrag {
                    attribute,
                    tx,
                    epoche,
                },
            )
            .is_some();

        tracing::info!(id = %id, ersetzt, "Identitaet registriert");
        (rx, epoche)
    }

    /// Entfernt eine Identitaet und gibt ihre Attribute zurueck
    ///
    /// Entfernen einer unbekannten ID ist ein No-op, kein Fehler.
    pub fn entfernen(&self, id: &IdentityId) -> Option<IdentityAttribute> {
        let eintrag = self.inner.clients.remove(id).map(|(_, e)| e.attribute);
        if eintrag.is_some() {
            tracing::info!(id = %id, "Identitaet entfernt");
        }
        eintrag
    }

    /// Entfernt eine Identitaet nur wenn die Epoche noch stimmt
    ///
    /// Der Cleanup eines endenden Verbindungs-Tasks darf den Eintrag
    /// eines Reconnect-Nachfolgers nicht raeumen; gibt `true` zurueck
    /// wenn der eigene Eintrag entfernt wurde.
    pub fn entfernen_mit_epoche(&self, id: &IdentityId, epoche: u64) -> bool {
        let entfernt = self
            .inner
            .clients
            .remove_if(id, |_, eintrag| eintrag.epoche == epoche)
            .is_some();
        if entfernt {
            tracing::info!(id = %id, "Identitaet entfernt");
        }
        entfernt
    }

    /// Sendet ein Ereignis nicht-blockierend an eine Identitaet
    ///
    /// Best-effort: gibt `false` zurueck wenn die Identitaet abwesend,
    /// die Queue voll oder die Verbindung geschlossen ist. Der Aufrufer
    /// behandelt das nie als Fehler.
    pub fn senden(&self, id: &IdentityId, ereignis: ServerEvent) -> bool {
        let eintrag = match self.inner.clients.get(id) {
            Some(e) => e,
            None => {
                tracing::debug!(id = %id, "Senden an abwesende Identitaet verworfen");
                return false;
            }
        };

        match eintrag.tx.try_send(ereignis) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(id = %id, "Send-Queue voll – Ereignis verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(id = %id, "Send-Queue geschlossen (Verbindung getrennt)");
                false
            }
        }
    }

    /// Gibt die Attribute einer Identitaet zurueck
    pub fn attribute(&self, id: &IdentityId) -> Option<IdentityAttribute> {
        self.inner.clients.get(id).map(|e| e.attribute.clone())
    }

    /// Prueft ob eine Identitaet verbunden ist
    pub fn ist_online(&self, id: &IdentityId) -> bool {
        self.inner.clients.contains_key(id)
    }

    /// Gibt die Anzahl der verbundenen Identitaeten zurueck
    pub fn online_anzahl(&self) -> usize {
        self.inner.clients.len()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_attribute(name: &str) -> IdentityAttribute {
        IdentityAttribute {
            anzeige_name: name.to_string(),
            video_aktiv: true,
            audio_aktiv: true,
        }
    }

    #[tokio::test]
    async fn registrieren_und_senden() {
        let registry = PresenceRegistry::neu();
        let id = IdentityId::neu();

        let (mut rx, _) = registry.registrieren(id.clone(), test_attribute("anna"));
        assert!(registry.ist_online(&id));
        assert_eq!(registry.online_anzahl(), 1);

        assert!(registry.senden(&id, ServerEvent::QueueTimeout));
        let ereignis = rx.try_recv().expect("Ereignis muss vorhanden sein");
        assert!(matches!(ereignis, ServerEvent::QueueTimeout));
    }

    #[tokio::test]
    async fn senden_an_abwesende_identitaet_ist_no_op() {
        let registry = PresenceRegistry::neu();
        let id = IdentityId::neu();

        // Kein Fehler, nur false
        assert!(!registry.senden(&id, ServerEvent::QueueTimeout));
    }

    #[tokio::test]
    async fn entfernen_unbekannter_id_ist_no_op() {
        let registry = PresenceRegistry::neu();
        assert!(registry.entfernen(&IdentityId::neu()).is_none());
    }

    #[tokio::test]
    async fn reconnect_ersetzt_alten_eintrag() {
        let registry = PresenceRegistry::neu();
        let id = IdentityId::from("wiederkehrer");

        let (mut alte_rx, _) = registry.registrieren(id.clone(), test_attribute("alt"));
        let (mut neue_rx, _) = registry.registrieren(id.clone(), test_attribute("neu"));

        // Nur ein Eintrag, die alte Queue ist tot
        assert_eq!(registry.online_anzahl(), 1);
        assert_eq!(registry.attribute(&id).unwrap().anzeige_name, "neu");

        assert!(registry.senden(&id, ServerEvent::QueueTimeout));
        assert!(neue_rx.try_recv().is_ok());
        assert!(matches!(
            alte_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn clone_teilt_inneren_state() {
        let r1 = PresenceRegistry::neu();
        let r2 = r1.clone();
        let id = IdentityId::neu();

        let _rx = r1.registrieren(id.clone(), IdentityAttribute::default());
        assert!(r2.ist_online(&id));
    }

    #[tokio::test]
    async fn epoche_schuetzt_nachfolger_vor_altem_cleanup() {
        let registry = PresenceRegistry::neu();
        let id = IdentityId::from("wiederkehrer");

        let (_alte_rx, alte_epoche) = registry.registrieren(id.clone(), test_attribute("alt"));
        let (_neue_rx, neue_epoche) = registry.registrieren(id.clone(), test_attribute("neu"));

        // Cleanup des ersetzten Vorgaengers darf den Nachfolger nicht raeumen
        assert!(!registry.entfernen_mit_epoche(&id, alte_epoche));
        assert!(registry.ist_online(&id));

        assert!(registry.entfernen_mit_epoche(&id, neue_epoche));
        assert!(!registry.ist_online(&id));
    }
}
