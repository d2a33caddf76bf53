//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Fleet-level aggregation for the dashboard."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use oee_common::time::round_to;
use oee_sim::CellSnapshot;
use serde::{Deserialize, Serialize};

/// Dashboard header figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_cells: usize,
    /// Cells whose external status is `OPERATIONAL` or `WARNING`.
    pub active_cells: usize,
    pub total_produced: u64,
    /// Mean of the per-cell OEE values, not OEE of the summed production.
    #[serde(rename = "globalOEE")]
    pub global_oee: f64,
    pub timestamp: DateTime<Utc>,
}

impl DashboardSummary {
    pub fn from_snapshots(snapshots: &[CellSnapshot], timestamp: DateTime<Utc>) -> Self {
        let total_cells = snapshots.len();
        let active_cells = snapshots
            .iter()
            .filter(|snapshot| snapshot.status.is_active())
            .count();
        let total_produced = snapshots
            .iter()
            .map(|snapshot| snapshot.units_produced)
            .sum();
        let global_oee = if total_cells == 0 {
            0.0
        } else {
            let sum: f64 = snapshots.iter().map(|snapshot| snapshot.oee).sum();
            round_to(sum / total_cells as f64, 2)
        };
        Self {
            total_cells,
            active_cells,
            total_produced,
            global_oee,
            timestamp,
        }
    }
}
