//! blinddate-protocol – Wire-Protokoll
//!
//! Definiert die Ereignisse die zwischen Client und Server ausgetauscht
//! werden sowie das Frame-Format fuer die TCP-Verbindung.
//!
//! ## Design
//! - Tagged Enums fuer typsichere Ereignistypen; die Tag-Namen entsprechen
//!   den Ereignisnamen des Browser-Clients (`request-chat`, `ice-candidate`, ...)
//! - JSON-Serialisierung via serde (Signaling ist nicht zeitkritisch)
//! - Handshake-Payloads (Offer/Answer/Candidate) bleiben opake JSON-Werte
//!   und werden unveraendert weitergereicht

pub mod control;
pub mod wire;

// Bequeme Re-Exporte
pub use control::{
    ChatMessage, ClientEvent, DisconnectReason, ForwardedSignal, HelloRequest, NegotiationRole,
    PairedInfo, ServerEvent, SignalRequest,
};
pub use wire::{ClientCodec, FrameCodec, ServerCodec};
