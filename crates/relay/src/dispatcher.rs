//! Message-Dispatcher – Routet Client-Ereignisse an die Zustands-Manager
//!
//! Der Dispatcher verarbeitet alle Ereignisse einer registrierten
//! Verbindung. Antworten und Weiterleitungen laufen ausnahmslos ueber
//! die Send-Queues der PresenceRegistry; der Dispatcher haelt selbst
//! keine Verbindungs-Handles.
//!
//! ## Zustellgarantie
//! Zustellung ist best-effort: ist der Empfaenger abwesend oder seine
//! Queue voll, wird das Ereignis verworfen. Signaling-Nachrichten an
//! eine andere als die aktuelle Partner-Identitaet werden ebenfalls
//! verworfen; Nachzuegler einer beendeten Sitzung erreichen so nie
//! einen Wartenden oder eine fremde Sitzung.

use blinddate_core::types::IdentityId;
use blinddate_matching::{verhandlungs_rollen, VermittlungsErgebnis};
use blinddate_protocol::control::{
    ChatMessage, ClientEvent, DisconnectReason, ForwardedSignal, PairedInfo, ServerEvent,
    SignalRequest,
};
use std::sync::Arc;

use crate::server_state::RelayState;

/// Zentraler Message-Dispatcher
///
/// Pro Verbindung instanziiert, aber zustandslos; der gesamte geteilte
/// Zustand liegt im `RelayState`.
pub struct MessageDispatcher {
    state: Arc<RelayState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein eingehendes Client-Ereignis
    ///
    /// `id` ist die bereits registrierte Identitaet der Verbindung.
    /// Antworten gehen ueber die PresenceRegistry, nie direkt ueber den
    /// TCP-Stream.
    pub async fn dispatch(&self, id: &IdentityId, ereignis: ClientEvent) {
        match ereignis {
            // Registrierung ist abgeschlossen; ein zweites Hello ist ein
            // Protokollverstoss des Clients
            ClientEvent::Hello(_) => {
                self.state
                    .presence
                    .senden(id, ServerEvent::fehler("Bereits registriert"));
            }

            ClientEvent::RequestChat { interests } => self.chat_anfordern(id, interests),

            ClientEvent::Leave => self.sitzung_verlassen(id),

            ClientEvent::Offer(anfrage) => {
                self.signal_weiterleiten(id, anfrage, ServerEvent::Offer)
            }
            ClientEvent::Answer(anfrage) => {
                self.signal_weiterleiten(id, anfrage, ServerEvent::Answer)
            }
            ClientEvent::IceCandidate(anfrage) => {
                self.signal_weiterleiten(id, anfrage, ServerEvent::IceCandidate)
            }

            ClientEvent::Message { to, text } => self.nachricht_zustellen(id, to, text),

            ClientEvent::ReportUser {
                reported_id,
                reason,
            } => self.meldung_verarbeiten(id, reported_id, reason),
        }
    }

    // -----------------------------------------------------------------------
    // Vermittlung
    // -----------------------------------------------------------------------

    /// Verarbeitet eine Vermittlungsanfrage
    ///
    /// Gebannte Identitaeten erhalten `Banned` statt einer Einreihung.
    /// Eine Identitaet in aktiver Sitzung muss zuerst `Leave` senden;
    /// die Warteschlange prueft das selbst in ihrer kritischen Sektion.
    fn chat_anfordern(&self, id: &IdentityId, interessen: Vec<String>) {
        if self.state.moderation.ist_gebannt(id) {
            tracing::info!(id = %id, "Vermittlungsanfrage einer gebannten Identitaet");
            self.state.presence.senden(
                id,
                ServerEvent::Banned {
                    reason: "Wegen mehrfacher Meldungen gesperrt".to_string(),
                },
            );
            return;
        }

        match self
            .state
            .schlange
            .vermitteln(id.clone(), interessen.clone())
        {
            VermittlungsErgebnis::Gepaart {
                partner,
                partner_interessen,
            } => self.paar_ankuendigen(id, interessen, partner, partner_interessen),

            VermittlungsErgebnis::Eingereiht {
                position,
                generation,
            } => {
                self.state
                    .presence
                    .senden(id, ServerEvent::QueuePosition { position });
                self.timeout_task_starten(id.clone(), generation);
            }

            VermittlungsErgebnis::BereitsVermittelt => {
                self.state
                    .presence
                    .senden(id, ServerEvent::fehler("Bereits in einer aktiven Sitzung"));
            }
        }
    }

    /// Benachrichtigt beide Seiten eines frisch vermittelten Paares mit
    /// den Daten des jeweils anderen; die Sitzung selbst hat die
    /// Warteschlange bereits installiert
    fn paar_ankuendigen(
        &self,
        anfrager: &IdentityId,
        anfrager_interessen: Vec<String>,
        partner: IdentityId,
        partner_interessen: Vec<String>,
    ) {
        let (anfrager_rolle, partner_rolle) = verhandlungs_rollen(anfrager, &partner);

        self.state.presence.senden(
            anfrager,
            ServerEvent::Paired(PairedInfo {
                partner_id: partner.clone(),
                partner_name: self.anzeige_name(&partner),
                partner_interests: partner_interessen,
                role: anfrager_rolle,
            }),
        );
        self.state.presence.senden(
            &partner,
            ServerEvent::Paired(PairedInfo {
                partner_id: anfrager.clone(),
                partner_name: self.anzeige_name(anfrager),
                partner_interests: anfrager_interessen,
                role: partner_rolle,
            }),
        );
    }

    fn anzeige_name(&self, id: &IdentityId) -> String {
        self.state
            .presence
            .attribute(id)
            .map(|a| a.anzeige_name)
            .unwrap_or_else(|| "Stranger".to_string())
    }

    /// Startet den Timeout-Task eines frisch eingereihten Tickets
    ///
    /// Der Task raeumt nach Ablauf nur das Ticket seiner eigenen
    /// Generation; Ticket-Entfernung bricht ihn ueber das hinterlegte
    /// Handle ab.
    fn timeout_task_starten(&self, id: IdentityId, generation: u64) {
        let schlange = self.state.schlange.clone();
        let presence = self.state.presence.clone();
        let dauer = schlange.timeout();

        let task_id = id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(dauer).await;
            if schlange.timeout_ausloesen(&task_id, generation) {
                presence.senden(&task_id, ServerEvent::QueueTimeout);
            }
        });

        self.state
            .schlange
            .timeout_handle_setzen(&id, generation, task.abort_handle());
    }

    // -----------------------------------------------------------------------
    // Sitzungsende
    // -----------------------------------------------------------------------

    /// Beendet die aktive Sitzung auf Wunsch des Clients
    ///
    /// Idempotent; ohne Sitzung wird hoechstens ein liegengebliebenes
    /// Warteticket storniert.
    fn sitzung_verlassen(&self, id: &IdentityId) {
        if let Some(partner) = self.state.sitzungen.verlassen(id) {
            self.state.presence.senden(
                &partner,
                ServerEvent::Disconnected {
                    reason: DisconnectReason::PartnerLeft,
                },
            );
        }
        self.state.schlange.stornieren(id);
    }

    /// Raeumt den Zustand einer getrennten Verbindung
    ///
    /// Wird vom Verbindungs-Task nach dem Ende der Verarbeitungsschleife
    /// aufgerufen. Die Epoche stellt sicher, dass der Cleanup eines
    /// ersetzten Vorgaengers (Reconnect) oder eines beim Bann bereits
    /// geraeumten Eintrags nicht den Zustand des Nachfolgers zerstoert.
    pub fn verbindung_trennen(&self, id: &IdentityId, epoche: u64) {
        if !self.state.presence.entfernen_mit_epoche(id, epoche) {
            tracing::debug!(id = %id, "Cleanup uebersprungen, Eintrag gehoert nicht mehr dieser Verbindung");
            return;
        }

        self.state.schlange.stornieren(id);
        if let Some(partner) = self.state.sitzungen.verlassen(id) {
            self.state.presence.senden(
                &partner,
                ServerEvent::Disconnected {
                    reason: DisconnectReason::Disconnected,
                },
            );
        }
    }

    // -----------------------------------------------------------------------
    // Partner-Relay
    // -----------------------------------------------------------------------

    /// Leitet eine Signaling-Nachricht an den aktuellen Partner weiter
    ///
    /// Verworfen wird ohne Sitzung oder wenn das `to`-Feld nicht den
    /// aktuellen Partner benennt (Nachzuegler einer beendeten Sitzung).
    fn signal_weiterleiten(
        &self,
        id: &IdentityId,
        anfrage: SignalRequest,
        einpacken: fn(ForwardedSignal) -> ServerEvent,
    ) {
        let partner = match self.partner_pruefen(id, &anfrage.to) {
            Some(p) => p,
            None => return,
        };

        self.state.presence.senden(
            &partner,
            einpacken(ForwardedSignal {
                from: id.clone(),
                payload: anfrage.payload,
            }),
        );
    }

    /// Filtert eine Chat-Nachricht und stellt sie dem Partner zu
    fn nachricht_zustellen(&self, id: &IdentityId, ziel: IdentityId, text: String) {
        let partner = match self.partner_pruefen(id, &ziel) {
            Some(p) => p,
            None => return,
        };

        let gefiltert = self.state.filter.filtern(&text);
        self.state.presence.senden(
            &partner,
            ServerEvent::Message(ChatMessage::neu(id.clone(), gefiltert)),
        );
    }

    /// Loest den aktuellen Partner auf und prueft das Ziel der Nachricht
    fn partner_pruefen(&self, id: &IdentityId, ziel: &IdentityId) -> Option<IdentityId> {
        let partner = match self.state.sitzungen.partner_von(id) {
            Some(p) => p,
            None => {
                tracing::debug!(id = %id, "Nachricht ohne aktive Sitzung verworfen");
                return None;
            }
        };
        if *ziel != partner {
            tracing::debug!(
                id = %id,
                ziel = %ziel,
                partner = %partner,
                "Nachricht an veralteten Partner verworfen"
            );
            return None;
        }
        Some(partner)
    }

    // -----------------------------------------------------------------------
    // Moderation
    // -----------------------------------------------------------------------

    /// Registriert eine Meldung und vollzieht bei Erreichen der Schwelle
    /// den Bann
    ///
    /// Der Vollzug benachrichtigt die gebannte Identitaet, beendet ihre
    /// Sitzung (der Partner erhaelt `Disconnected(Reported)`), storniert
    /// ihr Warteticket und entfernt sie aus der Registry. Das Schliessen
    /// der Send-Queue beendet ihren Verbindungs-Task.
    fn meldung_verarbeiten(&self, melder: &IdentityId, ziel: IdentityId, grund: String) {
        if ziel == *melder {
            self.state
                .presence
                .senden(melder, ServerEvent::fehler("Selbstmeldung verworfen"));
            return;
        }

        let ergebnis = self.state.moderation.melden(&ziel, &grund);
        if !ergebnis.bann_ausgeloest {
            return;
        }

        tracing::warn!(
            ziel = %ziel,
            meldungen = ergebnis.anzahl,
            "Bann wird vollzogen"
        );

        // Benachrichtigung vor dem Entfernen, damit sie die Queue noch
        // erreicht; der Verbindungs-Task stellt gepufferte Ereignisse
        // auch nach dem Schliessen der Queue zu
        self.state.presence.senden(
            &ziel,
            ServerEvent::Banned {
                reason: "Wegen mehrfacher Meldungen gesperrt".to_string(),
            },
        );

        if let Some(partner) = self.state.sitzungen.verlassen(&ziel) {
            self.state.presence.senden(
                &partner,
                ServerEvent::Disconnected {
                    reason: DisconnectReason::Reported,
                },
            );
        }
        self.state.schlange.stornieren(&ziel);
        self.state.presence.entfernen(&ziel);
    }
}
