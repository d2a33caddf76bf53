//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Loop lifecycle against real timers."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use oee_common::config::AppConfig;
use oee_core::{CellRegistry, RuntimeOptions, SimulationRuntime};
use oee_metrics::{new_registry, SimulationMetrics};
use oee_msg::InMemoryPublisher;
use oee_persistence::{JsonlSnapshotLog, PersistenceError, SnapshotLogReader, SnapshotSink};
use oee_sim::TelemetryFrame;
use tempfile::tempdir;

#[allow(clippy::field_reassign_with_default)]
fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.plant.cell_count = 3;
    config.plant.ideal_cycle_time_secs = 0.05;
    config.simulation.status_change_probability = 0.0;
    config.simulation.recovery_probability = 0.0;
    config.simulation.product_change_probability = 0.0;
    config
}

fn fast_options() -> RuntimeOptions {
    RuntimeOptions {
        tick_interval: Duration::from_millis(10),
        factor_interval: Duration::from_millis(100),
        telemetry_interval: Duration::from_millis(50),
    }
}

struct FailingSink;

impl SnapshotSink for FailingSink {
    fn record(&self, _frames: &[TelemetryFrame]) -> Result<usize, PersistenceError> {
        Err(PersistenceError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "database unavailable",
        )))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn loops_produce_publish_and_persist() {
    let config = fast_config();
    let dir = tempdir().unwrap();
    let path = dir.path().join("oee_snapshots.jsonl");
    let publisher = InMemoryPublisher::new();
    let metrics = SimulationMetrics::new(new_registry()).unwrap();
    let registry = Arc::new(
        CellRegistry::initialize(&config, Arc::new(publisher.clone()), Utc::now())
            .with_metrics(metrics.clone()),
    );

    let handle = SimulationRuntime::new(registry.clone(), fast_options())
        .with_sink(Arc::new(JsonlSnapshotLog::open(&path).unwrap()))
        .with_metrics(metrics.clone())
        .start();
    tokio::time::sleep(Duration::from_millis(400)).await;
    handle.shutdown().await.unwrap();

    assert!(metrics.ticks() > 5);
    assert!(registry.summary(Utc::now()).total_produced > 0);
    assert!(!publisher.on_topic("porto-brasil/cell/C01/status").is_empty());

    let rows: Vec<_> = SnapshotLogReader::open(&path)
        .unwrap()
        .map(|row| row.unwrap())
        .collect();
    assert!(rows.len() >= 3);
    assert_eq!(rows[0].cell_id, "C01");
    assert_eq!(rows[2].cell_id, "C03");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn persistence_failures_are_counted_not_fatal() {
    let config = fast_config();
    let metrics = SimulationMetrics::new(new_registry()).unwrap();
    let registry = Arc::new(CellRegistry::initialize(
        &config,
        Arc::new(InMemoryPublisher::new()),
        Utc::now(),
    ));

    let handle = SimulationRuntime::new(registry.clone(), fast_options())
        .with_sink(Arc::new(FailingSink))
        .with_metrics(metrics.clone())
        .start();
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.shutdown().await.unwrap();

    assert!(metrics.persistence_failures() >= 1);
    assert!(registry.summary(Utc::now()).total_produced > 0);
}

#[tokio::test]
async fn shutdown_signal_reaches_companion_tasks() {
    let registry = Arc::new(CellRegistry::initialize(
        &fast_config(),
        Arc::new(InMemoryPublisher::new()),
        Utc::now(),
    ));
    let handle = SimulationRuntime::new(registry, fast_options()).start();
    let mut companion = handle.subscribe_shutdown();
    let waiter = tokio::spawn(async move { companion.recv().await.is_ok() });
    handle.shutdown().await.unwrap();
    assert!(waiter.await.unwrap());
}
