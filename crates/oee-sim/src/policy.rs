//! ---
//! oee_section: "11-simulation"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Randomized simulation policy driven by an injected random source."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
//! Every random decision of the simulation lives here. Each function consumes
//! plain uniform `f64` draws from the caller's RNG, so a scripted source fully
//! determines the outcome.

use oee_common::config::{FactorBand, PlantConfig, SimulationConfig};
use rand::Rng;

use crate::status::CellStatus;

/// Relative weights used when the policy reassigns a cell's status.
pub const STATUS_WEIGHTS: [(CellStatus, f64); 4] = [
    (CellStatus::Running, 3.0),
    (CellStatus::Stopped, 1.0),
    (CellStatus::Maintenance, 1.0),
    (CellStatus::Error, 0.0),
];

pub const RUNNING_TEMPERATURE_C: (f64, f64) = (60.0, 10.0);
pub const IDLE_TEMPERATURE_C: (f64, f64) = (30.0, 5.0);
pub const RUNNING_VIBRATION: (f64, f64) = (2.0, 3.0);
pub const IDLE_VIBRATION: f64 = 0.1;
pub const AVAILABILITY_FLOOR: f64 = 95.0;
pub const AVAILABILITY_SPREAD: f64 = 5.0;

/// Ambient sensor reading of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: f64,
    pub vibration: f64,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            temperature: 45.0,
            vibration: 2.0,
        }
    }
}

/// Tunable parameters of the randomized process noise.
#[derive(Debug, Clone)]
pub struct SimulationPolicy {
    pub performance_band: FactorBand,
    pub quality_band: FactorBand,
    pub status_change_probability: f64,
    pub recovery_probability: f64,
    pub product_change_probability: f64,
    pub products: Vec<String>,
}

impl Default for SimulationPolicy {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default(), &PlantConfig::default())
    }
}

impl SimulationPolicy {
    pub fn from_config(simulation: &SimulationConfig, plant: &PlantConfig) -> Self {
        Self {
            performance_band: simulation.performance_band,
            quality_band: simulation.quality_band,
            status_change_probability: simulation.status_change_probability,
            recovery_probability: simulation.recovery_probability,
            product_change_probability: simulation.product_change_probability,
            products: plant.products.clone(),
        }
    }

    /// A policy that never changes status or product; factors still follow the bands.
    pub fn steady(&self) -> Self {
        Self {
            status_change_probability: 0.0,
            recovery_probability: 0.0,
            product_change_probability: 0.0,
            ..self.clone()
        }
    }

    pub fn draw_performance_factor<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        draw_in_band(self.performance_band, rng)
    }

    pub fn draw_quality_factor<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        draw_in_band(self.quality_band, rng)
    }

    /// Status a cell moves to during a factor refresh, if any.
    ///
    /// One draw decides a reassignment; when it does, a second draw picks the
    /// target from [`STATUS_WEIGHTS`]. Otherwise a non-running cell spends one
    /// more draw on a recovery chance.
    pub fn draw_status_transition<R: Rng + ?Sized>(
        &self,
        current: CellStatus,
        rng: &mut R,
    ) -> Option<CellStatus> {
        if chance(self.status_change_probability, rng) {
            return Some(weighted_pick(&STATUS_WEIGHTS, rng.gen::<f64>()));
        }
        if !current.is_running() && chance(self.recovery_probability, rng) {
            return Some(CellStatus::Running);
        }
        None
    }

    /// Product the cell switches to during a factor refresh, if any.
    pub fn draw_product_change<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        if self.products.is_empty() || !chance(self.product_change_probability, rng) {
            return None;
        }
        let index = uniform_index(self.products.len(), rng.gen::<f64>());
        self.products.get(index).cloned()
    }
}

/// Ambient readings for the given status. Running cells consume two draws, others one.
pub fn draw_sensors<R: Rng + ?Sized>(status: CellStatus, rng: &mut R) -> SensorReading {
    if status.is_running() {
        let (temp_base, temp_spread) = RUNNING_TEMPERATURE_C;
        let (vib_base, vib_spread) = RUNNING_VIBRATION;
        SensorReading {
            temperature: temp_base + rng.gen::<f64>() * temp_spread,
            vibration: vib_base + rng.gen::<f64>() * vib_spread,
        }
    } else {
        let (temp_base, temp_spread) = IDLE_TEMPERATURE_C;
        SensorReading {
            temperature: temp_base + rng.gen::<f64>() * temp_spread,
            vibration: IDLE_VIBRATION,
        }
    }
}

/// True when a uniform draw lands in the top `probability` share of `[0, 1)`.
pub fn chance<R: Rng + ?Sized>(probability: f64, rng: &mut R) -> bool {
    if probability <= 0.0 {
        return false;
    }
    rng.gen::<f64>() >= 1.0 - probability
}

/// Map a uniform draw onto a weighted list. Zero-weight entries are never selected.
pub fn weighted_pick<T: Copy>(weights: &[(T, f64)], draw: f64) -> T {
    let total: f64 = weights.iter().map(|(_, weight)| weight.max(0.0)).sum();
    let mut remaining = draw.clamp(0.0, 1.0) * total;
    let mut last_selectable = weights[0].0;
    for (value, weight) in weights {
        let weight = weight.max(0.0);
        if weight == 0.0 {
            continue;
        }
        last_selectable = *value;
        if remaining < weight {
            return *value;
        }
        remaining -= weight;
    }
    last_selectable
}

fn draw_in_band<R: Rng + ?Sized>(band: FactorBand, rng: &mut R) -> f64 {
    band.min + rng.gen::<f64>() * (band.max - band.min)
}

fn uniform_index(len: usize, draw: f64) -> usize {
    ((draw.clamp(0.0, 1.0) * len as f64) as usize).min(len.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;

    #[test]
    fn weighted_pick_respects_cumulative_weights() {
        assert_eq!(weighted_pick(&STATUS_WEIGHTS, 0.0), CellStatus::Running);
        assert_eq!(weighted_pick(&STATUS_WEIGHTS, 0.59), CellStatus::Running);
        assert_eq!(weighted_pick(&STATUS_WEIGHTS, 0.61), CellStatus::Stopped);
        assert_eq!(weighted_pick(&STATUS_WEIGHTS, 0.81), CellStatus::Maintenance);
        assert_eq!(weighted_pick(&STATUS_WEIGHTS, 0.999), CellStatus::Maintenance);
    }

    #[test]
    fn zero_weight_status_is_never_picked() {
        for step in 0..1000 {
            let draw = step as f64 / 1000.0;
            assert_ne!(weighted_pick(&STATUS_WEIGHTS, draw), CellStatus::Error);
        }
    }

    #[test]
    fn factors_stay_inside_bands() {
        let policy = SimulationPolicy::default();
        let mut low = ScriptedRng::constant(0.0);
        let mut high = ScriptedRng::constant(0.999_999);
        assert_eq!(policy.draw_performance_factor(&mut low), 0.8);
        assert!(policy.draw_performance_factor(&mut high) < 1.1);
        assert_eq!(policy.draw_quality_factor(&mut low), 0.90);
        assert!(policy.draw_quality_factor(&mut high) < 0.99);
    }

    #[test]
    fn status_reassignment_uses_second_draw() {
        let policy = SimulationPolicy::default();
        let mut rng = ScriptedRng::new(vec![0.97, 0.9]);
        assert_eq!(
            policy.draw_status_transition(CellStatus::Running, &mut rng),
            Some(CellStatus::Maintenance)
        );
        assert_eq!(rng.consumed(), 2);
    }

    #[test]
    fn running_cell_without_reassignment_stays() {
        let policy = SimulationPolicy::default();
        let mut rng = ScriptedRng::new(vec![0.5]);
        assert_eq!(
            policy.draw_status_transition(CellStatus::Running, &mut rng),
            None
        );
        assert_eq!(rng.consumed(), 1);
    }

    #[test]
    fn stopped_cell_recovers_on_high_draw() {
        let policy = SimulationPolicy::default();
        let mut recover = ScriptedRng::new(vec![0.1, 0.8]);
        assert_eq!(
            policy.draw_status_transition(CellStatus::Stopped, &mut recover),
            Some(CellStatus::Running)
        );
        let mut stay = ScriptedRng::new(vec![0.1, 0.5]);
        assert_eq!(
            policy.draw_status_transition(CellStatus::Maintenance, &mut stay),
            None
        );
    }

    #[test]
    fn product_change_picks_from_catalogue() {
        let policy = SimulationPolicy::default();
        let mut rng = ScriptedRng::new(vec![0.99, 0.30]);
        assert_eq!(
            policy.draw_product_change(&mut rng).as_deref(),
            Some("XICARA-CAFE-PRETO")
        );
        let mut quiet = ScriptedRng::new(vec![0.5]);
        assert_eq!(policy.draw_product_change(&mut quiet), None);
    }

    #[test]
    fn steady_policy_never_changes_state() {
        let policy = SimulationPolicy::default().steady();
        let mut rng = ScriptedRng::constant(0.999);
        assert_eq!(
            policy.draw_status_transition(CellStatus::Stopped, &mut rng),
            None
        );
        assert_eq!(policy.draw_product_change(&mut rng), None);
    }

    #[test]
    fn sensor_ranges_follow_status() {
        let mut rng = ScriptedRng::new(vec![0.5, 0.5]);
        let running = draw_sensors(CellStatus::Running, &mut rng);
        assert_eq!(running.temperature, 65.0);
        assert_eq!(running.vibration, 3.5);

        let mut rng = ScriptedRng::new(vec![0.5]);
        let idle = draw_sensors(CellStatus::Stopped, &mut rng);
        assert_eq!(idle.temperature, 32.5);
        assert_eq!(idle.vibration, IDLE_VIBRATION);
        assert_eq!(rng.consumed(), 1);
    }
}
