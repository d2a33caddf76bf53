//! ---
//! oee_section: "11-simulation"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Cell lifecycle states and their external vocabulary."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Internal lifecycle state of a production cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellStatus {
    #[default]
    Running,
    Stopped,
    Maintenance,
    /// Reserved; the randomized policy never selects it.
    Error,
}

impl CellStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellStatus::Running => "RUNNING",
            CellStatus::Stopped => "STOPPED",
            CellStatus::Maintenance => "MAINTENANCE",
            CellStatus::Error => "ERROR",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, CellStatus::Running)
    }

    /// Status shown to dashboard consumers. Evaluated at read time from the live OEE.
    pub fn external(&self, oee: f64, warning_threshold: f64) -> ExternalStatus {
        match self {
            CellStatus::Running if oee < warning_threshold => ExternalStatus::Warning,
            CellStatus::Running => ExternalStatus::Operational,
            CellStatus::Maintenance => ExternalStatus::Maintenance,
            CellStatus::Stopped | CellStatus::Error => ExternalStatus::Stopped,
        }
    }

    /// Fault text recorded when the randomized policy moves a cell into this state.
    pub fn unplanned_fault(&self) -> Option<&'static str> {
        match self {
            CellStatus::Running => None,
            CellStatus::Stopped => Some("unplanned stop"),
            CellStatus::Maintenance => Some("scheduled maintenance"),
            CellStatus::Error => Some("controller fault"),
        }
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status vocabulary of the REST/dashboard surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalStatus {
    Operational,
    Warning,
    Stopped,
    Maintenance,
}

impl ExternalStatus {
    /// True for both states backed by an internally running cell.
    pub fn is_active(&self) -> bool {
        matches!(self, ExternalStatus::Operational | ExternalStatus::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_maps_to_warning_below_threshold() {
        assert_eq!(
            CellStatus::Running.external(59.99, 60.0),
            ExternalStatus::Warning
        );
        assert_eq!(
            CellStatus::Running.external(60.0, 60.0),
            ExternalStatus::Operational
        );
    }

    #[test]
    fn non_running_states_ignore_oee() {
        assert_eq!(
            CellStatus::Maintenance.external(99.0, 60.0),
            ExternalStatus::Maintenance
        );
        assert_eq!(
            CellStatus::Stopped.external(99.0, 60.0),
            ExternalStatus::Stopped
        );
        assert_eq!(CellStatus::Error.external(0.0, 60.0), ExternalStatus::Stopped);
    }

    #[test]
    fn serializes_in_upper_case() {
        assert_eq!(
            serde_json::to_string(&CellStatus::Maintenance).unwrap(),
            "\"MAINTENANCE\""
        );
        assert_eq!(
            serde_json::to_string(&ExternalStatus::Operational).unwrap(),
            "\"OPERATIONAL\""
        );
    }
}
