//! Fehlertypen fuer den Vermittlungs-Kern

use blinddate_core::types::IdentityId;
use thiserror::Error;

/// Fehlertyp fuer den Vermittlungs-Kern
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchingError {
    /// Identitaet ist bereits Teil einer aktiven Sitzung
    #[error("Bereits vermittelt: {0}")]
    BereitsVermittelt(IdentityId),

    /// Sitzung mit sich selbst ist nicht moeglich
    #[error("Selbst-Vermittlung: {0}")]
    SelbstVermittlung(IdentityId),
}

/// Result-Typ fuer den Vermittlungs-Kern
pub type MatchingResult<T> = Result<T, MatchingError>;
