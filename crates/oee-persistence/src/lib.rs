//! ---
//! oee_section: "03-persistence-logging"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Persistence collaborator for periodic cell snapshots."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Snapshot persistence. Sinks receive already-computed telemetry frames and
//! never feed anything back into the simulation.

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error type for the persistence subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Wrapper for IO errors encountered while reading/writing snapshot files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub mod snapshot_log;

pub use snapshot_log::{
    replay as replay_snapshot_log, JsonlSnapshotLog, SnapshotLogReader, SnapshotRecord,
    SnapshotSink,
};
