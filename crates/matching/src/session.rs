//! Session-Manager – Symmetrische Paarungs-Map aktiver Sitzungen
//!
//! Besitzt die Zuordnung aller aktuell vermittelten Identitaeten. Die
//! Map ist symmetrisch: zeigt A auf B, zeigt B auf A, zu jedem
//! beobachtbaren Zeitpunkt. Auf- und Abbau sind gepaarte Operationen –
//! beide Seiten werden in derselben kritischen Sektion eingetragen bzw.
//! entfernt, sodass nie eine Seite eine veraltete Referenz auf eine
//! abgebaute Sitzung haelt.
//!
//! Eine entdeckte Asymmetrie ist eine Invariantenverletzung: sie wird
//! laut geloggt und die betroffenen Eintraege werden zwangsweise
//! zurueckgesetzt – nie still toleriert, nie ein Prozess-Absturz.

use blinddate_core::types::IdentityId;
use blinddate_protocol::control::NegotiationRole;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{MatchingError, MatchingResult};

// ---------------------------------------------------------------------------
// Rollenvergabe
// ---------------------------------------------------------------------------

/// Berechnet die deterministischen Verhandlungsrollen eines Paares
///
/// Das lexikografisch groessere Token gibt bei Kollision nach (polite),
/// das kleinere gewinnt (impolite). Wird einmalig bei der
/// Sitzungserstellung berechnet und beiden Seiten mitgeteilt, statt von
/// jedem Client ad hoc neu bestimmt zu werden.
pub fn verhandlungs_rollen(a: &IdentityId, b: &IdentityId) -> (NegotiationRole, NegotiationRole) {
    if a > b {
        (NegotiationRole::Polite, NegotiationRole::Impolite)
    } else {
        (NegotiationRole::Impolite, NegotiationRole::Polite)
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Eintrag einer Sitzungs-Seite
struct SitzungsEintrag {
    partner: IdentityId,
    #[allow(dead_code)]
    erstellt_um: Instant,
}

/// Verwaltet die Paarungs-Map aller aktiven Sitzungen
///
/// Thread-safe via Arc + Mutex. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    paare: Mutex<HashMap<IdentityId, SitzungsEintrag>>,
}

impl SessionManager {
    /// Erstellt einen neuen SessionManager
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                paare: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Installiert die symmetrische Zuordnung eines neuen Paares
    ///
    /// Schlaegt fehl wenn eine der beiden Identitaeten bereits Teil
    /// einer Sitzung ist (keine Identitaet ist je Mitglied zweier
    /// Sitzungen) oder beide Seiten identisch sind.
    pub fn sitzung_erstellen(&self, a: &IdentityId, b: &IdentityId) -> MatchingResult<()> {
        if a == b {
            return Err(MatchingError::SelbstVermittlung(a.clone()));
        }

        let mut paare = self.inner.paare.lock();
        if paare.contains_key(a) {
            return Err(MatchingError::BereitsVermittelt(a.clone()));
        }
        if paare.contains_key(b) {
            return Err(MatchingError::BereitsVermittelt(b.clone()));
        }

        let jetzt = Instant::now();
        paare.insert(
            a.clone(),
            SitzungsEintrag {
                partner: b.clone(),
                erstellt_um: jetzt,
            },
        );
        paare.insert(
            b.clone(),
            SitzungsEintrag {
                partner: a.clone(),
                erstellt_um: jetzt,
            },
        );

        tracing::info!(a = %a, b = %b, sitzungen = paare.len() / 2, "Sitzung erstellt");
        Ok(())
    }

    /// Gibt den aktuellen Partner einer Identitaet zurueck
    ///
    /// Prueft die Symmetrie der Map mit; eine Asymmetrie wird laut
    /// geloggt und die betroffenen Eintraege zwangsweise entfernt.
    pub fn partner_von(&self, id: &IdentityId) -> Option<IdentityId> {
        let mut paare = self.inner.paare.lock();
        let partner = paare.get(id)?.partner.clone();

        match paare.get(&partner) {
            Some(rueck) if rueck.partner == *id => Some(partner),
            _ => {
                tracing::error!(
                    id = %id,
                    partner = %partner,
                    "Asymmetrische Paarungs-Map entdeckt – betroffene Sitzungen werden zurueckgesetzt"
                );
                paare.remove(id);
                paare.remove(&partner);
                None
            }
        }
    }

    /// Baut die Sitzung einer Identitaet ab und gibt den Partner zurueck
    ///
    /// Entfernt beide Eintraege in einer Operation; der Aufrufer
    /// benachrichtigt den zurueckgegebenen Partner. Idempotent: ohne
    /// aktive Sitzung ist der Aufruf ein No-op und gibt `None` zurueck.
    pub fn verlassen(&self, id: &IdentityId) -> Option<IdentityId> {
        let mut paare = self.inner.paare.lock();
        let partner = paare.remove(id)?.partner;

        match paare.get(&partner) {
            Some(rueck) if rueck.partner == *id => {
                paare.remove(&partner);
                tracing::debug!(id = %id, partner = %partner, "Sitzung abgebaut");
                Some(partner)
            }
            _ => {
                tracing::error!(
                    id = %id,
                    partner = %partner,
                    "Asymmetrische Paarungs-Map beim Abbau – Eintraege werden zurueckgesetzt"
                );
                paare.remove(&partner);
                None
            }
        }
    }

    /// Prueft ob eine Identitaet Teil einer aktiven Sitzung ist
    pub fn ist_vermittelt(&self, id: &IdentityId) -> bool {
        self.inner.paare.lock().contains_key(id)
    }

    /// Gibt die Anzahl aktiver Sitzungen zurueck
    pub fn sitzungs_anzahl(&self) -> usize {
        self.inner.paare.lock().len() / 2
    }

    /// Traegt eine einzelne Seite ohne Gegenstueck ein (nur fuer Tests
    /// der Asymmetrie-Behandlung)
    #[cfg(test)]
    fn eintrag_erzwingen(&self, von: &IdentityId, nach: &IdentityId) {
        self.inner.paare.lock().insert(
            von.clone(),
            SitzungsEintrag {
                partner: nach.clone(),
                erstellt_um: Instant::now(),
            },
        );
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
