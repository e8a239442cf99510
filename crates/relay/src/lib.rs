//! blinddate-relay – TCP-Relay fuer Vermittlung und Signaling
//!
//! Dieser Crate implementiert den Verbindungs-Layer des Servers: er
//! akzeptiert TCP-Verbindungen, registriert Identitaeten und routet
//! alle Client-Ereignisse an Warteschlange, Sitzungsverwaltung und
//! Moderation. WebRTC-Handshake-Payloads werden nur weitergereicht,
//! nie inspiziert.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Erstes Frame muss ein Hello sein -> Welcome
//!     |
//!     v
//! MessageDispatcher
//!     +-- RequestChat  -> WarteSchlange / SessionManager
//!     +-- Leave        -> SessionManager
//!     +-- Offer/Answer/IceCandidate -> Partner-Relay
//!     +-- Message      -> WortFilter + Partner-Relay
//!     +-- ReportUser   -> ModerationsLedger (Bann-Vollzug)
//!
//! PresenceRegistry – Wer ist verbunden, Send-Queues pro Verbindung
//! ```

pub mod connection;
pub mod dispatcher;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use server_state::{RelayConfig, RelayState};
pub use tcp::RelayServer;
