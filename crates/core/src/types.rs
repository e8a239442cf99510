//! Gemeinsame Identifikationstypen fuer Blinddate
//!
//! Die IdentityId verwendet das Newtype-Pattern um Verwechslungen mit
//! anderen String-Werten zur Compilezeit auszuschliessen. Das innere
//! Token ist opak: entweder vom Client beim Verbinden mitgeliefert oder
//! serverseitig als UUIDv4 erzeugt. Die lexikografische Ordnung auf dem
//! Token ist die deterministische Grundlage der Rollenvergabe bei der
//! Sitzungserstellung.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Identitaets-ID eines verbundenen Teilnehmers
///
/// Stabil fuer die Lebensdauer einer Verbindung. Ein Reconnect mit
/// demselben Token ersetzt den alten Eintrag in der Presence-Registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityId(pub String);

impl IdentityId {
    /// Erstellt eine neue zufaellige IdentityId (UUIDv4 als Token)
    pub fn neu() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Gibt das innere Token als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdentityId {
    fn default() -> Self {
        Self::neu()
    }
}

impl From<String> for IdentityId {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for IdentityId {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "identity:{}", self.0)
    }
}
