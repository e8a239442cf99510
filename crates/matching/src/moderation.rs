//! Moderations-Ledger – Meldungszaehler und Bann-Entscheidung
//!
//! Zaehlt Meldungen pro gemeldeter Identitaet, monoton steigend, nur
//! durch Prozess-Neustart zurueckgesetzt (kein Verfall – bewusst so
//! uebernommen und als offene Frage dokumentiert). Mehrfachmeldungen
//! desselben Melders zaehlen einzeln; es gibt keine Deduplizierung.
//!
//! Erreicht der Zaehler die Schwelle, signalisiert `melden` den Bann an
//! den Aufrufer. Der Aufrufer (Dispatcher) ist dafuer verantwortlich,
//! die Identitaet zu benachrichtigen und aus Registry, Warteschlange
//! und Sitzung zu entfernen. Eine gebannte Identitaet kann mit frischem
//! Token erneut verbinden – akzeptiertes, dokumentiertes Verhalten.

use blinddate_core::types::IdentityId;
use dashmap::DashMap;
use std::sync::Arc;

/// Standard-Schwelle ab der eine Identitaet gebannt wird
pub const STANDARD_MELDE_SCHWELLE: u32 = 3;

/// Ergebnis einer Meldung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeldeErgebnis {
    /// Neuer Zaehlerstand der gemeldeten Identitaet
    pub anzahl: u32,
    /// Zaehler liegt auf oder ueber der Schwelle; der Aufrufer muss den
    /// Bann vollziehen. Feuert auch fuer jede weitere Meldung ueber der
    /// Schwelle, damit ein wiederverbundenes gebanntes Token erneut
    /// entfernt wird.
    pub bann_ausgeloest: bool,
}

/// Meldungszaehler pro Identitaet mit fester Bann-Schwelle
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct ModerationsLedger {
    inner: Arc<ModerationsLedgerInner>,
}

struct ModerationsLedgerInner {
    /// Meldungen, indiziert nach gemeldeter IdentityId
    meldungen: DashMap<IdentityId, u32>,
    /// Bann-Schwelle
    schwelle: u32,
}

impl ModerationsLedger {
    /// Erstellt einen Ledger mit der Standard-Schwelle
    pub fn neu() -> Self {
        Self::mit_schwelle(STANDARD_MELDE_SCHWELLE)
    }

    /// Erstellt einen Ledger mit konfigurierter Schwelle
    pub fn mit_schwelle(schwelle: u32) -> Self {
        Self {
            inner: Arc::new(ModerationsLedgerInner {
                meldungen: DashMap::new(),
                schwelle: schwelle.max(1),
            }),
        }
    }

    /// Registriert eine Meldung und gibt den neuen Zaehlerstand zurueck
    pub fn melden(&self, ziel: &IdentityId, grund: &str) -> MeldeErgebnis {
        let mut eintrag = self.inner.meldungen.entry(ziel.clone()).or_insert(0);
        *eintrag += 1;
        let anzahl = *eintrag;
        drop(eintrag);

        let bann_ausgeloest = anzahl >= self.inner.schwelle;
        tracing::info!(
            ziel = %ziel,
            grund = grund,
            anzahl,
            bann_ausgeloest,
            "Identitaet gemeldet"
        );

        MeldeErgebnis {
            anzahl,
            bann_ausgeloest,
        }
    }

    /// Prueft ob eine Identitaet gebannt ist (`anzahl >= schwelle`)
    ///
    /// Pure Abfrage; wird von der Warteschlange genutzt um gebannte
    /// Identitaeten von der Vermittlung auszuschliessen.
    pub fn ist_gebannt(&self, id: &IdentityId) -> bool {
        self.inner
            .meldungen
            .get(id)
            .map(|anzahl| *anzahl >= self.inner.schwelle)
            .unwrap_or(false)
    }

    /// Gibt den aktuellen Zaehlerstand einer Identitaet zurueck
    pub fn meldungs_anzahl(&self, id: &IdentityId) -> u32 {
        self.inner.meldungen.get(id).map(|a| *a).unwrap_or(0)
    }

    /// Gibt die konfigurierte Schwelle zurueck
    pub fn schwelle(&self) -> u32 {
        self.inner.schwelle
    }
}

impl Default for ModerationsLedger {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
