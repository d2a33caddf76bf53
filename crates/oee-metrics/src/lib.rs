//! ---
//! oee_section: "03-persistence-logging"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Metrics collection and export utilities."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across services.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let addr = std_listener
        .local_addr()
        .with_context(|| "failed to read metrics listener address")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %addr, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

/// Prometheus scrape endpoint.
async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(prometheus::TEXT_FORMAT),
            )],
            body,
        ),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
                String::from("metrics encoding error"),
            )
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Bound address; resolves port 0 to the actual port.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Metrics recorded by the daemon process itself.
#[derive(Clone)]
pub struct DaemonMetrics {
    registry: SharedRegistry,
    starts_total: IntCounter,
    config_load_seconds: Histogram,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let starts_total = IntCounter::with_opts(Opts::new(
            "oee_simd_starts_total",
            "Total number of times the simulator daemon has initialised",
        ))?;
        registry.register(Box::new(starts_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.001, 2.0, 16)
            .context("failed to construct histogram buckets")?;
        let config_load_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "oee_simd_config_load_seconds",
                "Time spent loading and validating configuration",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(config_load_seconds.clone()))?;

        let build_info = GaugeVec::new(
            Opts::new(
                "oee_simd_build_info",
                "Build metadata for the running daemon binary",
            ),
            &["version", "profile"],
        )?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            registry,
            starts_total,
            config_load_seconds,
            build_info,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn inc_start(&self) {
        self.starts_total.inc();
    }

    pub fn observe_config_load(&self, seconds: f64) {
        self.config_load_seconds.observe(seconds);
    }

    pub fn set_build_info(&self, version: &str, profile: &str) {
        self.build_info
            .with_label_values(&[version, profile])
            .set(1.0);
    }
}

/// Counters and gauges fed by the simulation loops.
#[derive(Clone, Debug)]
pub struct SimulationMetrics {
    registry: SharedRegistry,
    ticks_total: IntCounter,
    pieces_total: IntCounterVec,
    cell_oee: GaugeVec,
    publish_failures: IntCounter,
    persistence_failures: IntCounter,
    tick_jitter_us: Histogram,
}

impl SimulationMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let ticks_total = IntCounter::with_opts(Opts::new(
            "oee_sim_ticks_total",
            "Production ticks executed across all cells",
        ))?;
        registry.register(Box::new(ticks_total.clone()))?;

        let pieces_total = IntCounterVec::new(
            Opts::new("oee_sim_pieces_total", "Pieces completed by cell and quality"),
            &["cell", "quality"],
        )?;
        registry.register(Box::new(pieces_total.clone()))?;

        let cell_oee = GaugeVec::new(
            Opts::new("oee_sim_cell_oee", "Composite OEE percentage per cell"),
            &["cell"],
        )?;
        registry.register(Box::new(cell_oee.clone()))?;

        let publish_failures = IntCounter::with_opts(Opts::new(
            "oee_sim_publish_failures_total",
            "Telemetry publishes rejected by the transport",
        ))?;
        registry.register(Box::new(publish_failures.clone()))?;

        let persistence_failures = IntCounter::with_opts(Opts::new(
            "oee_sim_persistence_failures_total",
            "Snapshot batches the persistence sink failed to write",
        ))?;
        registry.register(Box::new(persistence_failures.clone()))?;

        let buckets = prometheus::exponential_buckets(10.0, 2.0, 16)
            .context("failed to construct histogram buckets")?;
        let tick_jitter_us = Histogram::with_opts(
            HistogramOpts::new(
                "oee_sim_tick_jitter_us",
                "Deviation of the production tick from its period in microseconds",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(tick_jitter_us.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            pieces_total,
            cell_oee,
            publish_failures,
            persistence_failures,
            tick_jitter_us,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn inc_tick(&self) {
        self.ticks_total.inc();
    }

    pub fn ticks(&self) -> u64 {
        self.ticks_total.get()
    }

    pub fn record_piece(&self, cell: &str, quality: &str) {
        self.pieces_total.with_label_values(&[cell, quality]).inc();
    }

    pub fn set_cell_oee(&self, cell: &str, oee: f64) {
        self.cell_oee.with_label_values(&[cell]).set(oee);
    }

    /// Counter handed to broker forwarders so their failures land here too.
    pub fn publish_failure_counter(&self) -> IntCounter {
        self.publish_failures.clone()
    }

    pub fn inc_publish_failure(&self) {
        self.publish_failures.inc();
    }

    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.get()
    }

    pub fn inc_persistence_failure(&self) {
        self.persistence_failures.inc();
    }

    pub fn persistence_failures(&self) -> u64 {
        self.persistence_failures.get()
    }

    pub fn observe_tick_jitter(&self, micros: u64) {
        self.tick_jitter_us.observe(micros as f64);
    }
}

pub use prometheus;
