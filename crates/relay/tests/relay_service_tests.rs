//! Integrationstests fuer den Relay-Service
//!
//! Treibt den `MessageDispatcher` direkt gegen einen `RelayState`, ohne
//! TCP dazwischen: die Verbindungen werden durch registrierte
//! Presence-Eintraege simuliert und die Ereignisse aus deren
//! Send-Queues gelesen.

use blinddate_core::types::IdentityId;
use blinddate_matching::{IdentityAttribute, VermittlungsErgebnis};
use blinddate_protocol::control::{ClientEvent, DisconnectReason, ServerEvent, SignalRequest};
use blinddate_relay::{MessageDispatcher, RelayConfig, RelayState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

fn test_state() -> Arc<RelayState> {
    RelayState::neu(RelayConfig {
        wortliste: vec!["badword".to_string()],
        ..RelayConfig::default()
    })
}

/// Simuliert eine registrierte Verbindung
fn verbinden(
    state: &Arc<RelayState>,
    id: &str,
) -> (IdentityId, mpsc::Receiver<ServerEvent>, u64) {
    let id = IdentityId::from(id);
    let (rx, epoche) = state.presence.registrieren(
        id.clone(),
        IdentityAttribute {
            anzeige_name: id.as_str().to_string(),
            ..IdentityAttribute::default()
        },
    );
    (id, rx, epoche)
}

fn naechstes_ereignis(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    rx.try_recv().expect("Ereignis erwartet")
}

async fn paaren(
    dispatcher: &MessageDispatcher,
    a: &IdentityId,
    rx_a: &mut mpsc::Receiver<ServerEvent>,
    b: &IdentityId,
    rx_b: &mut mpsc::Receiver<ServerEvent>,
) {
    dispatcher
        .dispatch(a, ClientEvent::RequestChat { interests: vec![] })
        .await;
    // a wurde eingereiht
    assert!(matches!(
        naechstes_ereignis(rx_a),
        ServerEvent::QueuePosition { position: 1 }
    ));

    dispatcher
        .dispatch(b, ClientEvent::RequestChat { interests: vec![] })
        .await;
    assert!(matches!(naechstes_ereignis(rx_a), ServerEvent::Paired(_)));
    assert!(matches!(naechstes_ereignis(rx_b), ServerEvent::Paired(_)));
}

fn signal(an: &IdentityId) -> SignalRequest {
    SignalRequest {
        to: an.clone(),
        payload: serde_json::json!({"type": "offer", "sdp": "v=0"}),
    }
}

// ---------------------------------------------------------------------------
// Vermittlung
// ---------------------------------------------------------------------------

#[tokio::test]
async fn vermittlung_benachrichtigt_beide_seiten_symmetrisch() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");

    dispatcher
        .dispatch(
            &a,
            ClientEvent::RequestChat {
                interests: vec!["musik".to_string()],
            },
        )
        .await;
    assert!(matches!(
        naechstes_ereignis(&mut rx_a),
        ServerEvent::QueuePosition { position: 1 }
    ));

    dispatcher
        .dispatch(
            &b,
            ClientEvent::RequestChat {
                interests: vec!["musik".to_string()],
            },
        )
        .await;

    let info_a = match naechstes_ereignis(&mut rx_a) {
        ServerEvent::Paired(info) => info,
        andere => panic!("Erwartete Paired, bekam {:?}", andere),
    };
    let info_b = match naechstes_ereignis(&mut rx_b) {
        ServerEvent::Paired(info) => info,
        andere => panic!("Erwartete Paired, bekam {:?}", andere),
    };

    assert_eq!(info_a.partner_id, b);
    assert_eq!(info_b.partner_id, a);
    assert_eq!(info_a.partner_name, "ben");
    assert_eq!(info_b.partner_interests, vec!["musik".to_string()]);
    // Die Rollen sind komplementaer
    assert_ne!(info_a.role, info_b.role);

    assert!(state.sitzungen.ist_vermittelt(&a));
    assert!(state.sitzungen.ist_vermittelt(&b));
    assert_eq!(state.schlange.wartende_anzahl(), 0);
}

#[tokio::test]
async fn anfrage_in_aktiver_sitzung_gibt_fehler() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    paaren(&dispatcher, &a, &mut rx_a, &b, &mut rx_b).await;

    dispatcher
        .dispatch(&a, ClientEvent::RequestChat { interests: vec![] })
        .await;
    assert!(matches!(
        naechstes_ereignis(&mut rx_a),
        ServerEvent::Error { .. }
    ));
    // Die Sitzung besteht weiter
    assert!(state.sitzungen.ist_vermittelt(&a));
}

#[tokio::test]
async fn wiederanfrage_waehrend_der_uebergabe_wird_abgewiesen() {
    // Zwischen der Entnahme des Wartetickets und dem Versand der
    // Paired-Ereignisse darf sich der frisch vermittelte Partner nicht
    // erneut einreihen koennen: die Sitzung entsteht in derselben
    // kritischen Sektion wie die Ticket-Entnahme.
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, _rx_a, _) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");

    dispatcher
        .dispatch(
            &b,
            ClientEvent::RequestChat {
                interests: vec!["musik".to_string()],
            },
        )
        .await;
    assert!(matches!(
        naechstes_ereignis(&mut rx_b),
        ServerEvent::QueuePosition { .. }
    ));

    // a's Anfrage entnimmt b's Ticket und installiert die Sitzung
    let ergebnis = state
        .schlange
        .vermitteln(a.clone(), vec!["musik".to_string()]);
    assert!(matches!(ergebnis, VermittlungsErgebnis::Gepaart { .. }));

    // b fragt sofort erneut an, noch vor den Paired-Benachrichtigungen
    dispatcher
        .dispatch(
            &b,
            ClientEvent::RequestChat {
                interests: vec!["musik".to_string()],
            },
        )
        .await;

    assert!(matches!(
        naechstes_ereignis(&mut rx_b),
        ServerEvent::Error { .. }
    ));
    assert!(
        !state.schlange.ist_wartend(&b),
        "wartend und vermittelt schliessen sich aus"
    );
    assert!(state.sitzungen.ist_vermittelt(&b));
}

#[tokio::test]
async fn warteticket_timeout_benachrichtigt_den_besitzer() {
    let state = RelayState::neu(RelayConfig {
        warte_timeout_sek: 0,
        ..RelayConfig::default()
    });
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");

    dispatcher
        .dispatch(&a, ClientEvent::RequestChat { interests: vec![] })
        .await;
    assert!(matches!(
        naechstes_ereignis(&mut rx_a),
        ServerEvent::QueuePosition { position: 1 }
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(
        naechstes_ereignis(&mut rx_a),
        ServerEvent::QueueTimeout
    ));
    assert!(!state.schlange.ist_wartend(&a));
}

// ---------------------------------------------------------------------------
// Sitzungsende
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leave_benachrichtigt_den_partner() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    paaren(&dispatcher, &a, &mut rx_a, &b, &mut rx_b).await;

    dispatcher.dispatch(&a, ClientEvent::Leave).await;

    assert!(matches!(
        naechstes_ereignis(&mut rx_b),
        ServerEvent::Disconnected {
            reason: DisconnectReason::PartnerLeft
        }
    ));
    assert!(!state.sitzungen.ist_vermittelt(&a));
    assert!(!state.sitzungen.ist_vermittelt(&b));
    // Beide bleiben verbunden
    assert!(state.presence.ist_online(&a));
    assert!(state.presence.ist_online(&b));
}

#[tokio::test]
async fn verbindungsabbruch_raeumt_und_benachrichtigt_partner() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, epoche_a) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    paaren(&dispatcher, &a, &mut rx_a, &b, &mut rx_b).await;

    dispatcher.verbindung_trennen(&a, epoche_a);

    assert!(matches!(
        naechstes_ereignis(&mut rx_b),
        ServerEvent::Disconnected {
            reason: DisconnectReason::Disconnected
        }
    ));
    assert!(!state.presence.ist_online(&a));
    assert!(!state.sitzungen.ist_vermittelt(&b));
}

#[tokio::test]
async fn veralteter_cleanup_zerstoert_den_nachfolger_nicht() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, alte_epoche) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    paaren(&dispatcher, &a, &mut rx_a, &b, &mut rx_b).await;

    // Reconnect: a registriert sich neu, die alte Verbindung endet
    let (_a2, _rx_a2, _) = verbinden(&state, "anna");
    dispatcher.verbindung_trennen(&a, alte_epoche);

    // Presence und Sitzung des Nachfolgers bleiben unberuehrt
    assert!(state.presence.ist_online(&a));
    assert!(state.sitzungen.ist_vermittelt(&a));
    assert!(rx_b.try_recv().is_err(), "Partner darf nichts erhalten");
}

// ---------------------------------------------------------------------------
// Partner-Relay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signale_erreichen_nur_den_aktuellen_partner() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    paaren(&dispatcher, &a, &mut rx_a, &b, &mut rx_b).await;

    dispatcher.dispatch(&a, ClientEvent::Offer(signal(&b))).await;
    match naechstes_ereignis(&mut rx_b) {
        ServerEvent::Offer(weitergeleitet) => {
            assert_eq!(weitergeleitet.from, a);
            assert_eq!(weitergeleitet.payload["type"], "offer");
        }
        andere => panic!("Erwartete Offer, bekam {:?}", andere),
    }
}

#[tokio::test]
async fn nachzuegler_einer_beendeten_sitzung_werden_verworfen() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    paaren(&dispatcher, &a, &mut rx_a, &b, &mut rx_b).await;

    dispatcher.dispatch(&a, ClientEvent::Leave).await;
    let _ = naechstes_ereignis(&mut rx_b); // Disconnected

    // a signalisiert noch an den alten Partner
    dispatcher.dispatch(&a, ClientEvent::Offer(signal(&b))).await;
    dispatcher
        .dispatch(
            &a,
            ClientEvent::Message {
                to: b.clone(),
                text: "hallo?".to_string(),
            },
        )
        .await;

    assert!(rx_b.try_recv().is_err(), "Nachzuegler duerfen b nicht erreichen");
}

#[tokio::test]
async fn signal_an_fremde_identitaet_wird_verworfen() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    let (c, mut rx_c, _) = verbinden(&state, "carla");
    paaren(&dispatcher, &a, &mut rx_a, &b, &mut rx_b).await;

    // a adressiert die unbeteiligte c statt des Partners b
    dispatcher.dispatch(&a, ClientEvent::Offer(signal(&c))).await;

    assert!(rx_b.try_recv().is_err());
    assert!(rx_c.try_recv().is_err());
}

#[tokio::test]
async fn chat_nachrichten_werden_gefiltert_zugestellt() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    paaren(&dispatcher, &a, &mut rx_a, &b, &mut rx_b).await;

    dispatcher
        .dispatch(
            &a,
            ClientEvent::Message {
                to: b.clone(),
                text: "ein badword hier".to_string(),
            },
        )
        .await;

    match naechstes_ereignis(&mut rx_b) {
        ServerEvent::Message(nachricht) => {
            assert_eq!(nachricht.sender, a);
            assert_eq!(nachricht.text, "ein ******* hier");
        }
        andere => panic!("Erwartete Message, bekam {:?}", andere),
    }
    // Kein Echo an den Absender
    assert!(rx_a.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Moderation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dritte_meldung_vollzieht_den_bann() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    paaren(&dispatcher, &a, &mut rx_a, &b, &mut rx_b).await;

    for _ in 0..3 {
        dispatcher
            .dispatch(
                &a,
                ClientEvent::ReportUser {
                    reported_id: b.clone(),
                    reason: "spam".to_string(),
                },
            )
            .await;
    }

    assert!(matches!(
        naechstes_ereignis(&mut rx_b),
        ServerEvent::Banned { .. }
    ));
    assert!(matches!(
        naechstes_ereignis(&mut rx_a),
        ServerEvent::Disconnected {
            reason: DisconnectReason::Reported
        }
    ));

    assert!(state.moderation.ist_gebannt(&b));
    assert!(!state.presence.ist_online(&b));
    assert!(!state.sitzungen.ist_vermittelt(&a));
    assert!(!state.schlange.ist_wartend(&b));
}

#[tokio::test]
async fn gebannte_identitaet_wird_nicht_mehr_vermittelt() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    paaren(&dispatcher, &a, &mut rx_a, &b, &mut rx_b).await;

    for _ in 0..3 {
        dispatcher
            .dispatch(
                &a,
                ClientEvent::ReportUser {
                    reported_id: b.clone(),
                    reason: "spam".to_string(),
                },
            )
            .await;
    }

    // b verbindet sich mit demselben Token erneut
    let (b, mut rx_b, _) = verbinden(&state, "ben");
    dispatcher
        .dispatch(&b, ClientEvent::RequestChat { interests: vec![] })
        .await;

    assert!(matches!(
        naechstes_ereignis(&mut rx_b),
        ServerEvent::Banned { .. }
    ));
    assert!(!state.schlange.ist_wartend(&b));
}

#[tokio::test]
async fn selbstmeldung_wird_verworfen() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");

    for _ in 0..3 {
        dispatcher
            .dispatch(
                &a,
                ClientEvent::ReportUser {
                    reported_id: a.clone(),
                    reason: "unsinn".to_string(),
                },
            )
            .await;
        assert!(matches!(
            naechstes_ereignis(&mut rx_a),
            ServerEvent::Error { .. }
        ));
    }
    assert!(!state.moderation.ist_gebannt(&a));
}

// ---------------------------------------------------------------------------
// Protokoll
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zweites_hello_gibt_fehler() {
    let state = test_state();
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    let (a, mut rx_a, _) = verbinden(&state, "anna");

    dispatcher
        .dispatch(&a, ClientEvent::Hello(Default::default()))
        .await;
    assert!(matches!(
        naechstes_ereignis(&mut rx_a),
        ServerEvent::Error { .. }
    ));
}
