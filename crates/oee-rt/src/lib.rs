//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Runtime helpers supporting the simulation loops."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
//! Scheduling helpers for the simulator runtime.

pub mod scheduling;

pub use scheduling::{RateLimiter, TaskGroup};
