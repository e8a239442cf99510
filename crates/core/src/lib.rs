//! blinddate-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Blinddate-Crates gemeinsam genutzt werden.

pub mod types;

// Re-Export fuer bequemen Zugriff
pub use types::IdentityId;
