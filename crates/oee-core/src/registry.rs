//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Fixed collection of cells and its race-safe operations."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use oee_common::config::AppConfig;
use oee_metrics::SimulationMetrics;
use oee_msg::{publish_frame, TelemetryPublisher, TopicScheme};
use oee_sim::{
    cell_rng, Cell, CellConfig, CellSnapshot, ExternalStatus, PieceQuality, SimulationPolicy,
    TelemetryFrame,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::summary::DashboardSummary;

/// A cell together with the random stream that drives it.
struct CellSlot {
    cell: Cell,
    rng: StdRng,
}

/// Outcome of one production tick across the fleet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub good: usize,
    pub bad: usize,
    pub publish_failures: usize,
}

impl TickReport {
    pub fn pieces(&self) -> usize {
        self.good + self.bad
    }
}

/// Owns the fixed set of cells created at startup.
///
/// Each cell sits behind its own lock, so a manual override and a tick on the
/// same cell serialize while other cells proceed. Publishing always happens
/// after the lock is released.
pub struct CellRegistry {
    cells: IndexMap<String, Mutex<CellSlot>>,
    policy: SimulationPolicy,
    publisher: Arc<dyn TelemetryPublisher>,
    topics: TopicScheme,
    publish_per_piece: bool,
    metrics: Option<SimulationMetrics>,
}

impl CellRegistry {
    /// Create `plant.cell_count` cells with ids `<prefix>01..` and run their initial factor draw.
    pub fn initialize(
        config: &AppConfig,
        publisher: Arc<dyn TelemetryPublisher>,
        now: DateTime<Utc>,
    ) -> Self {
        let plant = &config.plant;
        let policy = SimulationPolicy::from_config(&config.simulation, plant);
        let mut cells = IndexMap::with_capacity(plant.cell_count);

        for index in 0..plant.cell_count {
            let number = index + 1;
            let id = format!("{}{number:02}", plant.id_prefix);
            let cell_config = CellConfig {
                id: id.clone(),
                name: format!("{} {number:02}", plant.name_prefix),
                ideal_cycle_time: plant.ideal_cycle_time_secs,
                target_units: plant.target_units,
                initial_product: plant.initial_product.clone(),
                warning_threshold: config.simulation.warning_oee_threshold,
            };
            let mut cell = Cell::new(cell_config, now);
            let mut rng = cell_rng(config.simulation.random_seed, index);
            cell.randomize_factors(now, &policy, &mut rng);
            cells.insert(id, Mutex::new(CellSlot { cell, rng }));
        }

        info!(cells = cells.len(), seed = config.simulation.random_seed, "cell registry initialised");
        Self {
            cells,
            policy,
            publisher,
            topics: TopicScheme::new(config.telemetry.topic_prefix.clone()),
            publish_per_piece: config.telemetry.publish_per_piece,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SimulationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell ids in creation order.
    pub fn ids(&self) -> Vec<String> {
        self.cells.keys().cloned().collect()
    }

    pub fn publisher(&self) -> Arc<dyn TelemetryPublisher> {
        self.publisher.clone()
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    /// Advance every cell once. Completed pieces are published after each cell's lock is dropped.
    pub fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        for (id, slot) in &self.cells {
            let produced = {
                let mut guard = slot.lock();
                let CellSlot { cell, rng } = &mut *guard;
                let produced = cell.advance(now, rng);
                if let Some(metrics) = &self.metrics {
                    metrics.set_cell_oee(id, cell.metrics().oee);
                }
                produced
            };

            let Some(piece) = produced else { continue };
            match piece.quality {
                PieceQuality::Good => report.good += 1,
                PieceQuality::Bad => report.bad += 1,
            }
            debug!(cell_id = %id, quality = piece.quality.as_str(), total = piece.frame.production.total, "piece completed");
            if let Some(metrics) = &self.metrics {
                metrics.record_piece(id, piece.quality.as_str());
            }
            if self.publish_per_piece && !self.publish(&piece.frame) {
                report.publish_failures += 1;
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.inc_tick();
        }
        report
    }

    /// Re-draw simulation factors on every cell, logging status and product changes.
    pub fn randomize_all(&self, now: DateTime<Utc>) {
        for (id, slot) in &self.cells {
            let refresh = {
                let mut guard = slot.lock();
                let CellSlot { cell, rng } = &mut *guard;
                cell.randomize_factors(now, &self.policy, rng)
            };
            if let Some((from, to)) = refresh.status_change {
                info!(cell_id = %id, from = %from, to = %to, "cell status changed");
            }
            if let Some(product) = refresh.product_change {
                info!(cell_id = %id, product = %product, "product changed, counters reset");
            }
        }
    }

    /// Publish one frame; failures are logged and counted, never propagated.
    pub fn publish(&self, frame: &TelemetryFrame) -> bool {
        match publish_frame(self.publisher.as_ref(), &self.topics, frame) {
            Ok(()) => true,
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_publish_failure();
                }
                warn!(cell_id = %frame.id, publisher = self.publisher.name(), error = %err, "telemetry publish failed");
                false
            }
        }
    }

    pub fn snapshot_all(&self) -> Vec<CellSnapshot> {
        self.cells
            .values()
            .map(|slot| slot.lock().cell.snapshot())
            .collect()
    }

    pub fn snapshot(&self, id: &str) -> Result<CellSnapshot, RegistryError> {
        Ok(self.slot(id)?.lock().cell.snapshot())
    }

    pub fn telemetry_frames(&self, now: DateTime<Utc>) -> Vec<TelemetryFrame> {
        self.cells
            .values()
            .map(|slot| slot.lock().cell.telemetry_frame(now))
            .collect()
    }

    /// Add good pieces by hand, clamped at the target. Negative amounts are rejected.
    pub fn increment_production(
        &self,
        id: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<CellSnapshot, RegistryError> {
        let slot = self.slot(id)?;
        let amount = u64::try_from(amount).map_err(|_| RegistryError::InvalidAmount(amount))?;
        let mut guard = slot.lock();
        let applied = guard.cell.add_good_pieces(amount, now);
        if applied < amount {
            debug!(cell_id = %id, requested = amount, applied, "manual increment clamped at target");
        }
        Ok(guard.cell.snapshot())
    }

    /// Flip a cell between running and stopped; returns the new external status.
    pub fn toggle_status(&self, id: &str, now: DateTime<Utc>) -> Result<ExternalStatus, RegistryError> {
        let slot = self.slot(id)?;
        let (status, external) = {
            let mut guard = slot.lock();
            let status = guard.cell.toggle(now);
            (status, guard.cell.external_status())
        };
        info!(cell_id = %id, status = %status, "cell toggled by operator");
        Ok(external)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> DashboardSummary {
        DashboardSummary::from_snapshots(&self.snapshot_all(), now)
    }

    fn slot(&self, id: &str) -> Result<&Mutex<CellSlot>, RegistryError> {
        self.cells
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_owned()))
    }
}

impl std::fmt::Debug for CellRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellRegistry")
            .field("cells", &self.cells.len())
            .field("publisher", &self.publisher.name())
            .field("topics", &self.topics)
            .finish()
    }
}
