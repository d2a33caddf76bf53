//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Primary orchestration and lifecycle management."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
//! Cell registry, dashboard aggregation, and the runtime driving the
//! production and telemetry loops.

pub mod error;
pub mod registry;
pub mod runtime;
pub mod summary;

pub use error::RegistryError;
pub use registry::{CellRegistry, TickReport};
pub use runtime::{RuntimeHandle, RuntimeOptions, SimulationRuntime};
pub use summary::DashboardSummary;
