//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Shared configuration, logging and timing building blocks for the simulator."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
//! Shared primitives for the OEE simulator workspace: configuration loading,
//! logging bootstrap, loop timing, and numeric helpers.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod time;

pub use config::{
    ApiConfig, AppConfig, BrokerKind, FactorBand, LoadedAppConfig, LoggingConfig, MetricsConfig,
    PersistenceConfig, PlantConfig, SimulationConfig, TelemetryConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use metrics::{JitterHistogram, JitterSummary, LoopTimingReporter};
