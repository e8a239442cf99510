//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task.
//!
//! ## Ablauf
//! ```text
//! Verbunden -> Hello/Welcome -> Registriert -> Trennung
//! ```
//! Das erste Frame muss ein `Hello` sein; jedes andere Ereignis vor der
//! Registrierung beendet die Verbindung mit einem `Error`-Frame. Nach
//! der Registrierung pumpt die Schleife eingehende Frames in den
//! Dispatcher und die Send-Queue der Registry zurueck in den Stream.
//!
//! ## Lebensende
//! Die Schleife endet bei Client-Trennung, Frame-Fehler, Shutdown oder
//! wenn die Send-Queue geschlossen wird (Reconnect-Ersetzung oder
//! Bann-Vollzug haben den Registry-Eintrag geraeumt). Der Cleanup ist
//! ueber die Verbindungs-Epoche abgesichert.

use blinddate_core::types::IdentityId;
use blinddate_matching::IdentityAttribute;
use blinddate_protocol::control::{ClientEvent, ServerEvent};
use blinddate_protocol::wire::ServerCodec;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::dispatcher::MessageDispatcher;
use crate::server_state::RelayState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `ServerCodec`, dispatcht an `MessageDispatcher` und
/// sendet Ereignisse aus der Send-Queue zurueck. Laeuft in einem
/// eigenen tokio-Task.
pub struct ClientConnection {
    state: Arc<RelayState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<RelayState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        tracing::info!(peer = %peer_addr, "Neue Verbindung");

        let mut framed = Framed::new(stream, ServerCodec::new());

        // Registrierung: das erste Frame entscheidet
        let hello = tokio::select! {
            frame = framed.next() => frame,
            _ = shutdown_rx.changed() => {
                tracing::info!(peer = %peer_addr, "Shutdown vor der Registrierung");
                return;
            }
        };

        let (id, attribute) = match hello {
            Some(Ok(ClientEvent::Hello(anfrage))) => {
                let id = anfrage
                    .id
                    .map(IdentityId::from)
                    .unwrap_or_else(IdentityId::neu);
                let attribute = IdentityAttribute {
                    anzeige_name: anfrage
                        .display_name
                        .unwrap_or_else(|| "Stranger".to_string()),
                    video_aktiv: anfrage.video_enabled,
                    audio_aktiv: anfrage.audio_enabled,
                };
                (id, attribute)
            }
            Some(Ok(_)) => {
                tracing::warn!(peer = %peer_addr, "Ereignis vor der Registrierung");
                let _ = framed
                    .send(ServerEvent::fehler("Registrierung erforderlich"))
                    .await;
                return;
            }
            Some(Err(e)) => {
                tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler vor der Registrierung");
                return;
            }
            None => {
                tracing::info!(peer = %peer_addr, "Verbindung vor der Registrierung getrennt");
                return;
            }
        };

        let (mut empfangs_rx, epoche) = self.state.presence.registrieren(id.clone(), attribute);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        tracing::info!(peer = %peer_addr, id = %id, "Identitaet registriert");

        if framed
            .send(ServerEvent::Welcome { id: id.clone() })
            .await
            .is_err()
        {
            tracing::warn!(peer = %peer_addr, id = %id, "Welcome-Senden fehlgeschlagen");
        } else {
            loop {
                tokio::select! {
                    // Eingehendes Ereignis vom Client
                    frame = framed.next() => {
                        match frame {
                            Some(Ok(ereignis)) => {
                                dispatcher.dispatch(&id, ereignis).await;
                            }
                            Some(Err(e)) => {
                                tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
                                break;
                            }
                            None => {
                                tracing::info!(peer = %peer_addr, id = %id, "Verbindung vom Client getrennt");
                                break;
                            }
                        }
                    }

                    // Ausgehendes Ereignis aus der Send-Queue
                    ausgehend = empfangs_rx.recv() => {
                        match ausgehend {
                            Some(ereignis) => {
                                if let Err(e) = framed.send(ereignis).await {
                                    tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                                    break;
                                }
                            }
                            None => {
                                // Registry-Eintrag wurde ersetzt (Reconnect)
                                // oder beim Bann entfernt
                                tracing::info!(peer = %peer_addr, id = %id, "Send-Queue geschlossen, Verbindung wird beendet");
                                break;
                            }
                        }
                    }

                    // Shutdown-Signal
                    Ok(()) = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!(peer = %peer_addr, "Shutdown-Signal, Verbindung wird getrennt");
                            break;
                        }
                    }
                }
            }
        }

        dispatcher.verbindung_trennen(&id, epoche);
        tracing::info!(peer = %peer_addr, id = %id, "Verbindungs-Task beendet");
    }
}
