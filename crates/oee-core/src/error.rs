//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Errors surfaced by registry operations."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---

/// Declined registry operation. Never fatal to the simulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("cell {0} not found")]
    NotFound(String),
    #[error("increment amount must not be negative (got {0})")]
    InvalidAmount(i64),
}
