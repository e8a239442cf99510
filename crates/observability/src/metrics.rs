//! Prometheus-kompatible Metriken fuer Blinddate
//!
//! Registrierte Metriken:
//! - `blinddate_connected_clients` – Gauge: Aktuell verbundene Identitaeten
//! - `blinddate_waiting_clients` – Gauge: Aktuell Wartende im Pool
//! - `blinddate_active_sessions` – Gauge: Aktive 1:1-Sitzungen
//! - `blinddate_cpu_usage_percent` – Gauge: CPU-Auslastung
//! - `blinddate_memory_usage_bytes` – Gauge: Speicherverbrauch
//! - `blinddate_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `blinddate_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit
//!
//! Die Relay-Gauges werden von einem Sampler-Task im Server gesetzt,
//! nicht von den Zustands-Managern selbst.

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

/// Alle Blinddate-Prometheus-Metriken
#[derive(Clone)]
pub struct BlinddateMetrics {
    pub registry: Arc<Registry>,

    // Relay-Metriken
    pub connected_clients: Gauge,
    pub waiting_clients: Gauge,
    pub active_sessions: Gauge,

    // System-Metriken
    pub cpu_usage_percent: Gauge,
    pub memory_usage_bytes: Gauge,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl BlinddateMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Relay-Metriken ---
        let connected_clients = Gauge::with_opts(Opts::new(
            "blinddate_connected_clients",
            "Anzahl aktuell verbundener Identitaeten",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let waiting_clients = Gauge::with_opts(Opts::new(
            "blinddate_waiting_clients",
            "Anzahl Wartender im Vermittlungs-Pool",
        ))?;
        registry.register(Box::new(waiting_clients.clone()))?;

        let active_sessions = Gauge::with_opts(Opts::new(
            "blinddate_active_sessions",
            "Anzahl aktiver 1:1-Sitzungen",
        ))?;
        registry.register(Box::new(active_sessions.clone()))?;

        // --- System-Metriken ---
        let cpu_usage_percent = Gauge::with_opts(Opts::new(
            "blinddate_cpu_usage_percent",
            "CPU-Auslastung in Prozent (0-100)",
        ))?;
        registry.register(Box::new(cpu_usage_percent.clone()))?;

        let memory_usage_bytes = Gauge::with_opts(Opts::new(
            "blinddate_memory_usage_bytes",
            "Speicherverbrauch in Bytes",
        ))?;
        registry.register(Box::new(memory_usage_bytes.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new(
                "blinddate_http_requests_total",
                "Gesamtanzahl HTTP-Anfragen",
            ),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "blinddate_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            waiting_clients,
            active_sessions,
            cpu_usage_percent,
            memory_usage_bytes,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Gibt die prozessweite Metriken-Instanz zurueck
///
/// Router und Sampler-Tasks teilen sich dieselbe Registry.
pub fn globale_metriken() -> &'static BlinddateMetrics {
    static METRIKEN: OnceLock<BlinddateMetrics> = OnceLock::new();
    METRIKEN.get_or_init(|| BlinddateMetrics::neu().expect("Metriken-Initialisierung fehlgeschlagen"))
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(globale_metriken().clone())
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<BlinddateMetrics>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Startet den Hintergrund-Task fuer die System-Gauges
///
/// Aktualisiert CPU- und Speicher-Gauges im gegebenen Intervall.
pub fn system_sampler_starten(metriken: BlinddateMetrics, intervall: Duration) {
    tokio::spawn(async move {
        let mut system = sysinfo::System::new();
        loop {
            system.refresh_cpu_usage();
            system.refresh_memory();
            metriken
                .cpu_usage_percent
                .set(system.global_cpu_usage() as f64);
            metriken.memory_usage_bytes.set(system.used_memory() as f64);
            tokio::time::sleep(intervall).await;
        }
    });
}
