//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Duration conversion and decimal rounding helpers."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::time::Duration;

/// Convert a duration into microseconds, saturating at `u64::MAX`.
pub fn duration_to_micros(duration: Duration) -> u64 {
    duration
        .as_secs()
        .saturating_mul(1_000_000)
        .saturating_add(u64::from(duration.subsec_micros()))
}

/// Round `value` half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
