//! ---
//! oee_section: "11-simulation"
//! oee_subsection: "01-bootstrap"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Simulation module exports and shared types."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
//! Production-cell simulation: the per-cell state machine, its randomized
//! policy, and the views it exposes to query and telemetry consumers.

pub mod cell;
pub mod policy;
pub mod rng;
pub mod snapshot;
pub mod status;

pub use cell::{
    Cell, CellConfig, FactorRefresh, OeeMetrics, PieceQuality, ProducedPiece, MANUAL_STOP_FAULT,
};
pub use policy::{SensorReading, SimulationPolicy};
pub use rng::{cell_rng, ScriptedRng};
pub use snapshot::{CellSnapshot, TelemetryFrame};
pub use status::{CellStatus, ExternalStatus};
