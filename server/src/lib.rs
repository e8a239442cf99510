//! blinddate-server – Bibliotheks-Root
//!
//! Verdrahtet Relay, Observability und Shutdown-Handling zu einem
//! lauffaehigen Server.

pub mod config;

use anyhow::Result;
use blinddate_observability::{
    globale_metriken, observability_server_starten, system_sampler_starten,
};
use blinddate_relay::{RelayServer, RelayState};
use config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Intervall fuer die Relay- und System-Gauges
const SAMPLER_INTERVALL: Duration = Duration::from_secs(15);

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Relay-Zustand aufbauen
    /// 2. Observability-Server und Metrik-Sampler starten
    /// 3. TCP-Listener starten (Relay-Protokoll)
    /// 4. Auf Ctrl-C warten, dann Shutdown signalisieren
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let state = RelayState::neu(self.config.relay_config());

        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %self.config.tcp_bind_adresse(),
            "Server startet"
        );

        if self.config.observability.aktiviert {
            let obs_addr: SocketAddr = self.config.observability_bind_adresse().parse()?;
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(obs_addr).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });

            system_sampler_starten(globale_metriken().clone(), SAMPLER_INTERVALL);
            relay_sampler_starten(Arc::clone(&state), shutdown_rx.clone());
        }

        let bind_addr: SocketAddr = self.config.tcp_bind_adresse().parse()?;
        let relay = RelayServer::neu(Arc::clone(&state), bind_addr);
        let relay_task = tokio::spawn(relay.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        let _ = shutdown_tx.send(true);
        relay_task.await??;

        Ok(())
    }
}

/// Startet den Hintergrund-Task der die Relay-Gauges aktualisiert
fn relay_sampler_starten(
    state: Arc<RelayState>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    let metriken = globale_metriken().clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(SAMPLER_INTERVALL) => {
                    metriken
                        .connected_clients
                        .set(state.presence.online_anzahl() as f64);
                    metriken
                        .waiting_clients
                        .set(state.schlange.wartende_anzahl() as f64);
                    metriken
                        .active_sessions
                        .set(state.sitzungen.sitzungs_anzahl() as f64);
                }
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });
}
