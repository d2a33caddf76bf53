//! ---
//! oee_section: "11-simulation"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Read-only views of a cell for query and telemetry consumers."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{CellStatus, ExternalStatus};

/// Point-in-time view of a cell as served by the query surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSnapshot {
    pub id: String,
    pub name: String,
    pub status: ExternalStatus,
    pub oee: f64,
    pub availability: f64,
    pub performance: f64,
    pub quality: f64,
    pub current_product: String,
    pub units_produced: u64,
    pub target_units: u64,
    pub good_pieces: u64,
    pub bad_pieces: u64,
    pub temperature: f64,
    pub vibration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fault: Option<String>,
}

/// Payload published on `<prefix>/<id>/telemetry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub status: CellStatus,
    pub production: ProductionCounts,
    pub oee: OeeBreakdown,
    pub sensors: SensorValues,
    pub product: ProductInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionCounts {
    pub total: u64,
    pub good: u64,
    pub bad: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OeeBreakdown {
    pub availability: f64,
    pub performance: f64,
    pub quality: f64,
    pub global: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorValues {
    pub temperature: f64,
    pub vibration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub code: String,
    pub target: u64,
}
