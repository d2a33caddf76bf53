//! ---
//! oee_section: "11-simulation"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Per-cell production state machine and OEE computation."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use oee_common::time::round_to;
use rand::Rng;

use crate::policy::{draw_sensors, SensorReading, SimulationPolicy};
use crate::policy::{AVAILABILITY_FLOOR, AVAILABILITY_SPREAD};
use crate::snapshot::{
    CellSnapshot, OeeBreakdown, ProductInfo, ProductionCounts, SensorValues, TelemetryFrame,
};
use crate::status::{CellStatus, ExternalStatus};

pub const MANUAL_STOP_FAULT: &str = "manual stop";

const INITIAL_PERFORMANCE_FACTOR: f64 = 1.0;
const INITIAL_QUALITY_FACTOR: f64 = 0.98;

/// Static process configuration of a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellConfig {
    pub id: String,
    pub name: String,
    /// Seconds per piece at a performance factor of 1.0.
    pub ideal_cycle_time: f64,
    pub target_units: u64,
    pub initial_product: String,
    /// Running cells below this OEE are reported as `WARNING`.
    pub warning_threshold: f64,
}

impl CellConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ideal_cycle_time: 10.0,
            target_units: 5000,
            initial_product: "PRATO-FUNDO-BRANCO".to_owned(),
            warning_threshold: 60.0,
        }
    }
}

/// Derived OEE figures, all percentages in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OeeMetrics {
    pub availability: f64,
    pub performance: f64,
    pub quality: f64,
    pub oee: f64,
}

impl Default for OeeMetrics {
    fn default() -> Self {
        Self {
            availability: 100.0,
            performance: 100.0,
            quality: 100.0,
            oee: 100.0,
        }
    }
}

impl OeeMetrics {
    /// Composite OEE for three percentage factors.
    pub fn composite(availability: f64, performance: f64, quality: f64) -> f64 {
        availability * performance * quality / 10_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceQuality {
    Good,
    Bad,
}

impl PieceQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            PieceQuality::Good => "good",
            PieceQuality::Bad => "bad",
        }
    }
}

/// A piece completed during [`Cell::advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedPiece {
    pub quality: PieceQuality,
    pub frame: TelemetryFrame,
}

/// What a factor refresh changed besides the factors themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorRefresh {
    pub status_change: Option<(CellStatus, CellStatus)>,
    pub product_change: Option<String>,
}

/// One production cell: counters, sensors, simulation factors and derived OEE.
#[derive(Debug, Clone)]
pub struct Cell {
    config: CellConfig,
    status: CellStatus,
    started_at: DateTime<Utc>,
    last_piece_at: DateTime<Utc>,
    produced: u64,
    good: u64,
    bad: u64,
    current_product: String,
    performance_factor: f64,
    quality_factor: f64,
    availability_jitter: f64,
    metrics: OeeMetrics,
    sensors: SensorReading,
    last_fault: Option<String>,
}

impl Cell {
    /// A running cell whose run clock and piece timer start at `now`.
    pub fn new(config: CellConfig, now: DateTime<Utc>) -> Self {
        let current_product = config.initial_product.clone();
        Self {
            config,
            status: CellStatus::Running,
            started_at: now,
            last_piece_at: now,
            produced: 0,
            good: 0,
            bad: 0,
            current_product,
            performance_factor: INITIAL_PERFORMANCE_FACTOR,
            quality_factor: INITIAL_QUALITY_FACTOR,
            availability_jitter: 1.0,
            metrics: OeeMetrics::default(),
            sensors: SensorReading::default(),
            last_fault: None,
        }
    }

    pub fn with_factors(mut self, performance_factor: f64, quality_factor: f64) -> Self {
        self.performance_factor = performance_factor;
        self.quality_factor = quality_factor;
        self
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CellConfig {
        &self.config
    }

    pub fn status(&self) -> CellStatus {
        self.status
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn good(&self) -> u64 {
        self.good
    }

    pub fn bad(&self) -> u64 {
        self.bad
    }

    pub fn current_product(&self) -> &str {
        &self.current_product
    }

    pub fn performance_factor(&self) -> f64 {
        self.performance_factor
    }

    pub fn quality_factor(&self) -> f64 {
        self.quality_factor
    }

    pub fn metrics(&self) -> OeeMetrics {
        self.metrics
    }

    pub fn sensors(&self) -> SensorReading {
        self.sensors
    }

    pub fn last_piece_at(&self) -> DateTime<Utc> {
        self.last_piece_at
    }

    pub fn last_fault(&self) -> Option<&str> {
        self.last_fault.as_deref()
    }

    /// Seconds per piece at the current performance factor.
    pub fn current_cycle_time(&self) -> f64 {
        self.config.ideal_cycle_time / self.performance_factor
    }

    /// One simulation tick.
    ///
    /// Draw order: sensors (two draws when running, one otherwise), then for a
    /// running cell the availability jitter and, if a piece completes, its
    /// quality draw.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<ProducedPiece> {
        self.sensors = draw_sensors(self.status, rng);

        if !self.status.is_running() {
            self.recompute(now);
            return None;
        }

        self.availability_jitter = rng.gen::<f64>();

        let elapsed = seconds_between(self.last_piece_at, now);
        let piece = if elapsed >= self.current_cycle_time() {
            self.produced += 1;
            let quality = if rng.gen::<f64>() <= self.quality_factor {
                self.good += 1;
                PieceQuality::Good
            } else {
                self.bad += 1;
                PieceQuality::Bad
            };
            self.last_piece_at = now;
            Some(quality)
        } else {
            None
        };

        self.recompute(now);
        piece.map(|quality| ProducedPiece {
            quality,
            frame: self.telemetry_frame(now),
        })
    }

    /// Periodic re-draw of the simulation factors plus the rare status/product changes.
    pub fn randomize_factors<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        policy: &SimulationPolicy,
        rng: &mut R,
    ) -> FactorRefresh {
        self.performance_factor = policy.draw_performance_factor(rng);
        self.quality_factor = policy.draw_quality_factor(rng);

        let mut refresh = FactorRefresh::default();
        if let Some(next) = policy.draw_status_transition(self.status, rng) {
            let previous = self.status;
            let fault = next.unplanned_fault().unwrap_or_default();
            self.transition(next, fault);
            if previous != next {
                refresh.status_change = Some((previous, next));
            }
        }
        if let Some(product) = policy.draw_product_change(rng) {
            self.switch_product(product.clone());
            refresh.product_change = Some(product);
        }

        self.recompute(now);
        refresh
    }

    /// Manually add good pieces without passing the target. Returns the amount applied.
    pub fn add_good_pieces(&mut self, amount: u64, now: DateTime<Utc>) -> u64 {
        let headroom = self.config.target_units.saturating_sub(self.produced);
        let applied = amount.min(headroom);
        self.produced += applied;
        self.good += applied;
        self.recompute(now);
        applied
    }

    /// Flip between `RUNNING` and `STOPPED`; any non-running state restarts the cell.
    pub fn toggle(&mut self, now: DateTime<Utc>) -> CellStatus {
        let next = if self.status.is_running() {
            CellStatus::Stopped
        } else {
            CellStatus::Running
        };
        self.transition(next, MANUAL_STOP_FAULT);
        self.recompute(now);
        self.status
    }

    /// Start a new product run. Counters restart at zero; the run clock does not.
    pub fn switch_product(&mut self, product: String) {
        self.current_product = product;
        self.produced = 0;
        self.good = 0;
        self.bad = 0;
    }

    fn transition(&mut self, next: CellStatus, fault: &str) {
        if next != self.status && !next.is_running() {
            self.last_fault = Some(fault.to_owned());
        }
        self.status = next;
    }

    /// Rederive every OEE figure from the current state.
    ///
    /// Performance uses the time since the cell was created, not since the
    /// current product run started; quality and performance keep their last
    /// value while the counters are zero.
    fn recompute(&mut self, now: DateTime<Utc>) {
        self.metrics.availability = if self.status.is_running() {
            AVAILABILITY_FLOOR + AVAILABILITY_SPREAD * self.availability_jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };

        if self.produced > 0 {
            let run_time = seconds_between(self.started_at, now).max(0.0);
            let theoretical_max = run_time / self.config.ideal_cycle_time;
            self.metrics.performance = if theoretical_max > 0.0 {
                (self.produced as f64 / theoretical_max * 100.0).min(100.0)
            } else {
                100.0
            };
            self.metrics.quality = self.good as f64 / self.produced as f64 * 100.0;
        }

        self.metrics.oee = OeeMetrics::composite(
            self.metrics.availability,
            self.metrics.performance,
            self.metrics.quality,
        )
        .clamp(0.0, 100.0);
    }

    pub fn external_status(&self) -> ExternalStatus {
        self.status
            .external(self.metrics.oee, self.config.warning_threshold)
    }

    /// Dashboard view; the external status is derived from the live OEE.
    pub fn snapshot(&self) -> CellSnapshot {
        let status = self.external_status();
        let last_fault = match status {
            ExternalStatus::Stopped | ExternalStatus::Maintenance => self.last_fault.clone(),
            ExternalStatus::Operational | ExternalStatus::Warning => None,
        };
        CellSnapshot {
            id: self.config.id.clone(),
            name: self.config.name.clone(),
            status,
            oee: round_to(self.metrics.oee, 2),
            availability: round_to(self.metrics.availability, 2),
            performance: round_to(self.metrics.performance, 2),
            quality: round_to(self.metrics.quality, 2),
            current_product: self.current_product.clone(),
            units_produced: self.produced,
            target_units: self.config.target_units,
            good_pieces: self.good,
            bad_pieces: self.bad,
            temperature: round_to(self.sensors.temperature, 1),
            vibration: round_to(self.sensors.vibration, 2),
            last_fault,
        }
    }

    /// Telemetry payload in the internal status vocabulary.
    pub fn telemetry_frame(&self, timestamp: DateTime<Utc>) -> TelemetryFrame {
        TelemetryFrame {
            id: self.config.id.clone(),
            name: self.config.name.clone(),
            timestamp,
            status: self.status,
            production: ProductionCounts {
                total: self.produced,
                good: self.good,
                bad: self.bad,
            },
            oee: OeeBreakdown {
                availability: round_to(self.metrics.availability, 2),
                performance: round_to(self.metrics.performance, 2),
                quality: round_to(self.metrics.quality, 2),
                global: round_to(self.metrics.oee, 2),
            },
            sensors: SensorValues {
                temperature: round_to(self.sensors.temperature, 1),
                vibration: round_to(self.sensors.vibration, 2),
            },
            product: ProductInfo {
                code: self.current_product.clone(),
                target: self.config.target_units,
            },
        }
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;
    use chrono::Duration;

    fn cell_at(now: DateTime<Utc>) -> Cell {
        Cell::new(CellConfig::new("C01", "Célula de Produção 01"), now)
    }

    #[test]
    fn piece_completes_after_cycle_time() {
        let now = Utc::now();
        let mut cell = cell_at(now - Duration::seconds(10)).with_factors(1.0, 0.98);
        let mut rng = ScriptedRng::new(vec![0.5, 0.5, 0.5, 0.1]);
        let piece = cell.advance(now, &mut rng).expect("piece produced");
        assert_eq!(piece.quality, PieceQuality::Good);
        assert_eq!(cell.produced(), 1);
        assert_eq!(cell.good(), 1);
        assert_eq!(cell.last_piece_at(), now);
        assert_eq!(piece.frame.production.total, 1);
    }

    #[test]
    fn no_piece_before_cycle_time() {
        let now = Utc::now();
        let mut cell = cell_at(now - Duration::seconds(9)).with_factors(1.0, 0.98);
        let mut rng = ScriptedRng::constant(0.5);
        assert!(cell.advance(now, &mut rng).is_none());
        assert_eq!(cell.produced(), 0);
        assert_eq!(cell.last_piece_at(), now - Duration::seconds(9));
    }

    #[test]
    fn slower_performance_stretches_cycle() {
        let now = Utc::now();
        let mut cell = cell_at(now - Duration::seconds(11)).with_factors(0.8, 0.98);
        assert_eq!(cell.current_cycle_time(), 12.5);
        let mut rng = ScriptedRng::constant(0.5);
        assert!(cell.advance(now, &mut rng).is_none());
    }

    #[test]
    fn draw_above_quality_factor_is_bad() {
        let now = Utc::now();
        let mut cell = cell_at(now - Duration::seconds(10)).with_factors(1.0, 0.9);
        let mut rng = ScriptedRng::new(vec![0.5, 0.5, 0.5, 0.95]);
        let piece = cell.advance(now, &mut rng).unwrap();
        assert_eq!(piece.quality, PieceQuality::Bad);
        assert_eq!(cell.bad(), 1);
        assert_eq!(cell.metrics().quality, 0.0);
        assert_eq!(cell.metrics().oee, 0.0);
    }

    #[test]
    fn stopped_cell_only_updates_sensors() {
        let start = Utc::now();
        let mut cell = cell_at(start);
        cell.toggle(start);
        let now = start + Duration::seconds(30);
        let mut rng = ScriptedRng::constant(0.2);
        assert!(cell.advance(now, &mut rng).is_none());
        assert_eq!(cell.produced(), 0);
        assert_eq!(cell.last_piece_at(), start);
        assert_eq!(cell.sensors().temperature, 31.0);
        assert_eq!(cell.sensors().vibration, 0.1);
        assert_eq!(rng.consumed(), 1);
        assert_eq!(cell.metrics().availability, 0.0);
        assert_eq!(cell.metrics().oee, 0.0);
    }

    #[test]
    fn oee_is_product_of_sub_metrics() {
        let start = Utc::now();
        let mut cell = cell_at(start).with_factors(1.0, 0.9);
        let mut rng = ScriptedRng::new(vec![0.5, 0.5, 0.4, 0.1]);
        let now = start + Duration::seconds(20);
        cell.advance(now, &mut rng).unwrap();
        let metrics = cell.metrics();
        assert_eq!(metrics.availability, 97.0);
        assert_eq!(metrics.performance, 50.0);
        assert_eq!(metrics.quality, 100.0);
        assert!((metrics.oee - 48.5).abs() < 1e-9);
        assert_eq!(cell.external_status(), ExternalStatus::Warning);
    }

    #[test]
    fn manual_increment_clamps_to_target() {
        let now = Utc::now();
        let mut config = CellConfig::new("C02", "Célula de Produção 02");
        config.target_units = 10;
        let mut cell = Cell::new(config, now);
        assert_eq!(cell.add_good_pieces(7, now), 7);
        assert_eq!(cell.add_good_pieces(7, now), 3);
        assert_eq!(cell.add_good_pieces(1, now), 0);
        assert_eq!(cell.produced(), 10);
        assert_eq!(cell.good() + cell.bad(), cell.produced());
    }

    #[test]
    fn toggle_twice_restores_running() {
        let now = Utc::now();
        let mut cell = cell_at(now);
        assert_eq!(cell.toggle(now), CellStatus::Stopped);
        assert_eq!(cell.snapshot().status, ExternalStatus::Stopped);
        assert_eq!(cell.snapshot().last_fault.as_deref(), Some(MANUAL_STOP_FAULT));
        assert_eq!(cell.toggle(now), CellStatus::Running);
        assert_eq!(cell.snapshot().status, ExternalStatus::Operational);
        assert!(cell.snapshot().last_fault.is_none());
    }

    #[test]
    fn randomize_records_status_and_product_change() {
        let now = Utc::now();
        let mut cell = cell_at(now);
        cell.add_good_pieces(5, now);
        let policy = SimulationPolicy::default();
        // perf, quality, reassignment chance, weighted pick, product chance, product pick
        let mut rng = ScriptedRng::new(vec![0.5, 0.5, 0.99, 0.7, 0.99, 0.8]);
        let refresh = cell.randomize_factors(now, &policy, &mut rng);
        assert_eq!(
            refresh.status_change,
            Some((CellStatus::Running, CellStatus::Stopped))
        );
        assert_eq!(refresh.product_change.as_deref(), Some("PRATO-RASO-VERDE"));
        assert!((cell.performance_factor() - 0.95).abs() < 1e-9);
        assert!((cell.quality_factor() - 0.945).abs() < 1e-9);
        assert_eq!(cell.produced(), 0);
        assert_eq!(cell.last_fault(), Some("unplanned stop"));
        assert_eq!(cell.metrics().availability, 0.0);
    }

    #[test]
    fn stopped_cell_moved_to_maintenance_reports_new_fault() {
        let now = Utc::now();
        let mut cell = cell_at(now);
        cell.toggle(now);
        assert_eq!(cell.last_fault(), Some(MANUAL_STOP_FAULT));

        let policy = SimulationPolicy::default();
        // perf, quality, reassignment chance, weighted pick, product chance
        let mut rng = ScriptedRng::new(vec![0.5, 0.5, 0.99, 0.9, 0.5]);
        let refresh = cell.randomize_factors(now, &policy, &mut rng);
        assert_eq!(
            refresh.status_change,
            Some((CellStatus::Stopped, CellStatus::Maintenance))
        );
        let snapshot = cell.snapshot();
        assert_eq!(snapshot.status, ExternalStatus::Maintenance);
        assert_eq!(snapshot.last_fault.as_deref(), Some("scheduled maintenance"));
    }

    #[test]
    fn performance_uses_time_since_creation_across_product_runs() {
        let start = Utc::now();
        let mut cell = cell_at(start).with_factors(1.0, 0.98);
        let mut rng = ScriptedRng::new(vec![0.5, 0.5, 0.0, 0.0]);
        cell.advance(start + Duration::seconds(10), &mut rng).unwrap();
        assert_eq!(cell.metrics().performance, 100.0);

        cell.switch_product("BOWL-CERAMICA-AZUL".into());
        let later = start + Duration::seconds(40);
        let mut rng = ScriptedRng::new(vec![0.5, 0.5, 0.0, 0.0]);
        cell.advance(later, &mut rng).unwrap();
        // one piece in the new run, measured against 40 s of total cell life
        assert_eq!(cell.produced(), 1);
        assert_eq!(cell.metrics().performance, 25.0);
    }
}
