//! blinddate-matching – Vermittlungs-Kern
//!
//! Dieser Crate haelt den gesamten geteilten Zustand des Systems und
//! seine atomaren Verbund-Operationen:
//!
//! ```text
//! PresenceRegistry  – Wer ist verbunden, mit welchen Attributen;
//!                     besitzt exklusiv die Send-Queue jeder Verbindung
//! WortFilter        – Pure Funktion, maskiert unerwuenschte Woerter
//! ModerationsLedger – Meldungszaehler pro Identitaet, Bann-Schwelle
//! WarteSchlange     – Wartepool + Paarungs-Algorithmus (eine kritische
//!                     Sektion fuer "Kandidat finden, beide Tickets
//!                     entfernen, Sitzung installieren")
//! SessionManager    – Symmetrische Paarungs-Map aktiver Sitzungen
//! ```
//!
//! Eine Identitaet ist zu jedem Zeitpunkt wartend, vermittelt oder
//! untaetig – nie mehr als eines davon. Die Verbund-Operationen hier
//! sind so geschnitten, dass zwei gleichzeitige Vermittlungsanfragen
//! niemals dasselbe Warteticket doppelt vergeben koennen.

pub mod error;
pub mod filter;
pub mod moderation;
pub mod presence;
pub mod queue;
pub mod session;

// Bequeme Re-Exporte
pub use error::{MatchingError, MatchingResult};
pub use filter::WortFilter;
pub use moderation::{MeldeErgebnis, ModerationsLedger, STANDARD_MELDE_SCHWELLE};
pub use presence::{IdentityAttribute, PresenceRegistry};
pub use queue::{VermittlungsErgebnis, WarteSchlange};
pub use session::{verhandlungs_rollen, SessionManager};
