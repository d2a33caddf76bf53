//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Production and telemetry loops over a shared registry."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use oee_common::config::AppConfig;
use oee_common::metrics::LoopTimingReporter;
use oee_common::time::duration_to_micros;
use oee_metrics::SimulationMetrics;
use oee_persistence::SnapshotSink;
use oee_rt::{RateLimiter, TaskGroup};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::registry::CellRegistry;

/// Periods of the three independent schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub tick_interval: Duration,
    pub factor_interval: Duration,
    pub telemetry_interval: Duration,
}

impl RuntimeOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tick_interval: config.simulation.tick_interval,
            factor_interval: config.simulation.factor_interval,
            telemetry_interval: config.telemetry.interval,
        }
    }
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Starts the loops that drive a [`CellRegistry`].
pub struct SimulationRuntime {
    registry: Arc<CellRegistry>,
    options: RuntimeOptions,
    sink: Option<Arc<dyn SnapshotSink>>,
    metrics: Option<SimulationMetrics>,
}

impl SimulationRuntime {
    pub fn new(registry: Arc<CellRegistry>, options: RuntimeOptions) -> Self {
        Self {
            registry,
            options,
            sink: None,
            metrics: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_metrics(mut self, metrics: SimulationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn the production loop (tick plus factor refresh) and the telemetry loop.
    pub fn start(self) -> RuntimeHandle {
        let (shutdown_tx, _) = broadcast::channel(4);
        let mut tasks = TaskGroup::default();

        tasks.spawn(
            "production",
            run_production_loop(
                self.registry.clone(),
                self.options,
                self.metrics.clone(),
                shutdown_tx.subscribe(),
            ),
        );
        tasks.spawn(
            "telemetry",
            run_telemetry_loop(
                self.registry.clone(),
                self.options.telemetry_interval,
                self.sink.clone(),
                self.metrics.clone(),
                shutdown_tx.subscribe(),
            ),
        );

        info!(
            cells = self.registry.len(),
            tick_ms = self.options.tick_interval.as_millis() as u64,
            telemetry_ms = self.options.telemetry_interval.as_millis() as u64,
            "simulation runtime started"
        );

        RuntimeHandle {
            registry: self.registry,
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

/// Lifecycle handle for the running loops.
#[derive(Debug)]
pub struct RuntimeHandle {
    registry: Arc<CellRegistry>,
    shutdown: broadcast::Sender<()>,
    tasks: TaskGroup,
}

impl RuntimeHandle {
    pub fn registry(&self) -> Arc<CellRegistry> {
        self.registry.clone()
    }

    /// Receiver that fires when [`RuntimeHandle::shutdown`] is called, for companion tasks.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.tasks.join().await.context("simulation loops failed")?;
        info!("simulation runtime stopped");
        Ok(())
    }
}

async fn run_production_loop(
    registry: Arc<CellRegistry>,
    options: RuntimeOptions,
    metrics: Option<SimulationMetrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut ticker = RateLimiter::new(options.tick_interval);
    let mut factors = RateLimiter::new(options.factor_interval);
    let timing = LoopTimingReporter::new(options.tick_interval);
    info!(period_ms = ticker.period().as_millis() as u64, "production loop started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            instant = ticker.tick() => {
                if let Some(jitter) = timing.record_tick_at(instant.into_std()) {
                    if let Some(metrics) = &metrics {
                        metrics.observe_tick_jitter(duration_to_micros(jitter));
                    }
                }
                let report = registry.tick(Utc::now());
                if report.pieces() > 0 {
                    debug!(good = report.good, bad = report.bad, "production tick");
                }
            }
            _ = factors.tick() => {
                registry.randomize_all(Utc::now());
            }
        }
    }

    if let Some(summary) = timing.histogram().summary() {
        info!(mean_us = summary.mean_us, max_us = summary.max_us, samples = summary.samples, "production loop stopped");
    } else {
        info!("production loop stopped");
    }
    Ok(())
}

async fn run_telemetry_loop(
    registry: Arc<CellRegistry>,
    period: Duration,
    sink: Option<Arc<dyn SnapshotSink>>,
    metrics: Option<SimulationMetrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut ticker = RateLimiter::new(period);
    info!(period_ms = period.as_millis() as u64, "telemetry loop started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                let frames = registry.telemetry_frames(Utc::now());
                let failures = frames.iter().filter(|frame| !registry.publish(frame)).count();
                if failures > 0 {
                    debug!(failures, "telemetry round had publish failures");
                }

                let Some(sink) = sink.clone() else { continue };
                let persisted = tokio::task::spawn_blocking(move || sink.record(&frames)).await;
                let failure = match persisted {
                    Ok(Ok(count)) => {
                        debug!(records = count, "snapshot batch persisted");
                        None
                    }
                    Ok(Err(err)) => Some(err.to_string()),
                    Err(err) => Some(format!("persistence task panicked: {err}")),
                };
                if let Some(error) = failure {
                    if let Some(metrics) = &metrics {
                        metrics.inc_persistence_failure();
                    }
                    warn!(error = %error, "snapshot persistence failed");
                }
            }
        }
    }

    info!("telemetry loop stopped");
    Ok(())
}
