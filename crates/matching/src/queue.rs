//! Warteschlange – Wartepool und Paarungs-Algorithmus
//!
//! Ein einziger globaler Pool hinter einem Mutex. Die Verbund-Operation
//! "Kandidaten scannen, beide Tickets entfernen, Sitzung installieren"
//! laeuft komplett in einer kritischen Sektion, damit zwei gleichzeitige
//! Anfragen niemals denselben Wartenden doppelt vergeben und niemand
//! zwischen Ticket-Entnahme und Sitzungsaufbau erneut einreihen kann
//! (wartend und vermittelt schliessen sich aus). Alle Operationen sind O(n)
//! ueber die aktuell Wartenden – kein Sekundaerindex nach Interessen.
//! Das ist bis zu moderaten Wartendenzahlen ausreichend und eine
//! dokumentierte Skalierungsgrenze, kein Defekt.
//!
//! ## Eignung und Rangfolge
//! Ein Kandidat ist geeignet wenn seine Interessenmenge leer ist, die
//! des Anfragenden leer ist, oder sich beide schneiden. Geordnet wird
//! nach Anzahl gemeinsamer Interessen absteigend; Gleichstand gewinnt
//! der am laengsten Wartende (starvation-frei). Kandidaten ohne
//! Ueberschneidung – einschliesslich der universell kompatiblen ohne
//! Interessen – stehen damit hinter jeder echten Ueberschneidung.
//!
//! ## Timeout
//! Jedes Ticket bekommt vom Dispatcher einen verschiebbaren, abbrechbaren
//! Timeout-Task. Ticket-Entfernung bricht den Task ab; zusaetzlich
//! schuetzt eine Generationsnummer davor, dass ein verspaetet feuernder
//! Task ein neueres Ticket derselben Identitaet raeumt.

use blinddate_core::types::IdentityId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;

use crate::moderation::ModerationsLedger;
use crate::session::SessionManager;

// ---------------------------------------------------------------------------
// WarteTicket
// ---------------------------------------------------------------------------

/// Eintrag einer wartenden Identitaet
///
/// Pro Identitaet existiert hoechstens ein Ticket; eine erneute Anfrage
/// ersetzt das eigene Ticket statt es zu duplizieren.
struct WarteTicket {
    id: IdentityId,
    /// Interessen-Schnappschuss zum Zeitpunkt der Einreihung
    interessen: Vec<String>,
    eingereiht_um: Instant,
    /// Monotone Generationsnummer, schuetzt vor verspaeteten Timeouts
    generation: u64,
    /// Abbruch-Handle des laufenden Timeout-Tasks
    timeout_handle: Option<AbortHandle>,
}

impl WarteTicket {
    fn timeout_abbrechen(&mut self) {
        if let Some(handle) = self.timeout_handle.take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// VermittlungsErgebnis
// ---------------------------------------------------------------------------

/// Ergebnis einer Vermittlungsanfrage
#[derive(Debug)]
pub enum VermittlungsErgebnis {
    /// Sofort vermittelt; Ticket des Partners entfernt und Sitzung
    /// installiert, beides in derselben kritischen Sektion
    Gepaart {
        partner: IdentityId,
        partner_interessen: Vec<String>,
    },
    /// Kein geeigneter Kandidat; Ticket eingereiht bzw. ersetzt
    Eingereiht {
        /// 1-indizierte Position (Anzahl frueher Eingereihter + 1)
        position: usize,
        /// Generation des neuen Tickets, fuer den Timeout-Task
        generation: u64,
    },
    /// Anfrager ist bereits Teil einer aktiven Sitzung; nicht eingereiht
    BereitsVermittelt,
}

// ---------------------------------------------------------------------------
// WarteSchlange
// ---------------------------------------------------------------------------

/// Standard-Timeout fuer unvermittelte Tickets
pub const STANDARD_WARTE_TIMEOUT: Duration = Duration::from_secs(120);

/// Globaler Wartepool mit Paarungs-Algorithmus
///
/// Thread-safe via Arc + Mutex. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct WarteSchlange {
    inner: Arc<WarteSchlangeInner>,
}

struct WarteSchlangeInner {
    tickets: Mutex<Vec<WarteTicket>>,
    generationen: AtomicU64,
    /// Zum Ausschluss gebannter Identitaeten bei der Kandidatenwahl
    moderation: ModerationsLedger,
    /// Sitzungsmitgliedschaft wird unter dem Ticket-Lock geprueft und
    /// eine neue Sitzung dort auch installiert
    sitzungen: SessionManager,
    timeout: Duration,
}

impl WarteSchlange {
    /// Erstellt eine neue WarteSchlange
    pub fn neu(
        moderation: ModerationsLedger,
        sitzungen: SessionManager,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(WarteSchlangeInner {
                tickets: Mutex::new(Vec::new()),
                generationen: AtomicU64::new(0),
                moderation,
                sitzungen,
                timeout,
            }),
        }
    }

    /// Gibt das konfigurierte Warte-Timeout zurueck
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Versucht eine Vermittlung; reiht andernfalls ein
    ///
    /// Ein Anfrager in aktiver Sitzung wird abgewiesen; die Pruefung und
    /// der Sitzungsaufbau bei einer Paarung laufen unter dem Ticket-Lock,
    /// sodass zwischen Ticket-Entnahme und Sitzungsaufbau keine erneute
    /// Einreihung einer der beiden Seiten moeglich ist. Ein bestehendes
    /// eigenes Ticket wird ersetzt. Gebannte oder bereits vermittelte
    /// Kandidaten werden uebersprungen; liegengebliebene Tickets raeumt
    /// der jeweilige Vollzug per `stornieren`.
    pub fn vermitteln(
        &self,
        id: IdentityId,
        interessen: Vec<String>,
    ) -> VermittlungsErgebnis {
        let interessen = interessen_deduplizieren(interessen);
        let mut tickets = self.inner.tickets.lock();

        if self.inner.sitzungen.ist_vermittelt(&id) {
            tracing::debug!(id = %id, "Anfrage einer bereits vermittelten Identitaet abgewiesen");
            return VermittlungsErgebnis::BereitsVermittelt;
        }

        // Eigenes Ticket ersetzen, nicht duplizieren
        if let Some(pos) = tickets.iter().position(|t| t.id == id) {
            let mut alt = tickets.remove(pos);
            alt.timeout_abbrechen();
            tracing::debug!(id = %id, "Eigenes Warteticket ersetzt");
        }

        // Besten Kandidaten suchen: gemeinsame Interessen absteigend,
        // Gleichstand gewinnt der aelteste (kleinster Index, da die
        // Liste in Einreihungs-Reihenfolge gehalten wird).
        let mut bester: Option<(usize, usize)> = None;
        for (index, ticket) in tickets.iter().enumerate() {
            if self.inner.moderation.ist_gebannt(&ticket.id) {
                continue;
            }
            if self.inner.sitzungen.ist_vermittelt(&ticket.id) {
                continue;
            }
            if !interessen_kompatibel(&interessen, &ticket.interessen) {
                continue;
            }
            let gemeinsam = gemeinsame_interessen(&interessen, &ticket.interessen);
            match bester {
                Some((_, bisher)) if gemeinsam <= bisher => {}
                _ => bester = Some((index, gemeinsam)),
            }
        }

        if let Some((index, gemeinsam)) = bester {
            let mut partner_ticket = tickets.remove(index);
            match self
                .inner
                .sitzungen
                .sitzung_erstellen(&id, &partner_ticket.id)
            {
                Ok(()) => {
                    partner_ticket.timeout_abbrechen();
                    tracing::info!(
                        anfrager = %id,
                        partner = %partner_ticket.id,
                        gemeinsam,
                        wartende = tickets.len(),
                        "Vermittlung erfolgreich"
                    );
                    return VermittlungsErgebnis::Gepaart {
                        partner: partner_ticket.id,
                        partner_interessen: partner_ticket.interessen,
                    };
                }
                Err(e) => {
                    // Unter dem gehaltenen Lock nicht erreichbar, solange
                    // Sitzungen nur hier entstehen; Ticket bleibt erhalten
                    tracing::error!(
                        anfrager = %id,
                        partner = %partner_ticket.id,
                        fehler = %e,
                        "Sitzungsaufbau bei der Vermittlung fehlgeschlagen"
                    );
                    tickets.insert(index, partner_ticket);
                }
            }
        }

        // Kein Kandidat: einreihen
        let jetzt = Instant::now();
        let position = tickets
            .iter()
            .filter(|t| t.eingereiht_um < jetzt)
            .count()
            + 1;
        let generation = self.inner.generationen.fetch_add(1, Ordering::Relaxed);
        tickets.push(WarteTicket {
            id: id.clone(),
            interessen,
            eingereiht_um: jetzt,
            generation,
            timeout_handle: None,
        });

        tracing::debug!(id = %id, position, "In Warteschlange eingereiht");
        VermittlungsErgebnis::Eingereiht {
            position,
            generation,
        }
    }

    /// Hinterlegt das Abbruch-Handle des Timeout-Tasks eines Tickets
    ///
    /// Ist das Ticket dieser Generation schon weg (Vermittlung hat den
    /// Einreiher ueberholt), wird der Task sofort abgebrochen.
    pub fn timeout_handle_setzen(
        &self,
        id: &IdentityId,
        generation: u64,
        handle: AbortHandle,
    ) {
        let mut tickets = self.inner.tickets.lock();
        match tickets
            .iter_mut()
            .find(|t| t.id == *id && t.generation == generation)
        {
            Some(ticket) => {
                ticket.timeout_abbrechen();
                ticket.timeout_handle = Some(handle);
            }
            None => handle.abort(),
        }
    }

    /// Raeumt ein Ticket nach abgelaufenem Timeout
    ///
    /// Gibt `true` zurueck wenn das Ticket dieser Generation noch
    /// existierte und entfernt wurde; der Aufrufer benachrichtigt dann
    /// den Besitzer. Eviction bannt nicht und benachteiligt nicht.
    pub fn timeout_ausloesen(&self, id: &IdentityId, generation: u64) -> bool {
        let mut tickets = self.inner.tickets.lock();
        if let Some(pos) = tickets
            .iter()
            .position(|t| t.id == *id && t.generation == generation)
        {
            tickets.remove(pos);
            tracing::info!(id = %id, "Warteticket nach Timeout geraeumt");
            true
        } else {
            false
        }
    }

    /// Entfernt das Ticket einer Identitaet (Leave, Disconnect, Bann)
    ///
    /// Bricht einen laufenden Timeout-Task ab. No-op wenn kein Ticket
    /// existiert.
    pub fn stornieren(&self, id: &IdentityId) -> bool {
        let mut tickets = self.inner.tickets.lock();
        if let Some(pos) = tickets.iter().position(|t| t.id == *id) {
            let mut ticket = tickets.remove(pos);
            ticket.timeout_abbrechen();
            tracing::debug!(id = %id, "Warteticket storniert");
            true
        } else {
            false
        }
    }

    /// Prueft ob eine Identitaet wartet
    pub fn ist_wartend(&self, id: &IdentityId) -> bool {
        self.inner.tickets.lock().iter().any(|t| t.id == *id)
    }

    /// Gibt die Anzahl der Wartenden zurueck
    pub fn wartende_anzahl(&self) -> usize {
        self.inner.tickets.lock().len()
    }

    /// Pflanzt ein Ticket ohne Kandidatensuche direkt in den Pool ein
    /// (nur fuer Tests der Rangfolge)
    #[cfg(test)]
    fn ticket_einpflanzen(&self, id: &IdentityId, interessen: Vec<String>) {
        let generation = self.inner.generationen.fetch_add(1, Ordering::Relaxed);
        self.inner.tickets.lock().push(WarteTicket {
            id: id.clone(),
            interessen,
            eingereiht_um: Instant::now(),
            generation,
            timeout_handle: None,
        });
    }
}

// ---------------------------------------------------------------------------
// Interessen-Vergleich
// ---------------------------------------------------------------------------

/// Kollabiert Duplikate unter Erhalt der Reihenfolge
fn interessen_deduplizieren(interessen: Vec<String>) -> Vec<String> {
    let mut ergebnis: Vec<String> = Vec::with_capacity(interessen.len());
    for interesse in interessen {
        if !ergebnis.contains(&interesse) {
            ergebnis.push(interesse);
        }
    }
    ergebnis
}

/// Leere Interessenmengen sind universell kompatibel
fn interessen_kompatibel(a: &[String], b: &[String]) -> bool {
    a.is_empty() || b.is_empty() || gemeinsame_interessen(a, b) > 0
}

/// Anzahl gemeinsamer Interessen
fn gemeinsame_interessen(a: &[String], b: &[String]) -> usize {
    a.iter().filter(|interesse| b.contains(interesse)).count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
