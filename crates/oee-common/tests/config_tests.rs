//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Integration tests for configuration loading and the shipped sample file."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::io::Write;
use std::time::Duration;

use oee_common::config::AppConfig;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn load_with_source_picks_first_existing_candidate() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let mut file = NamedTempFile::new_in(dir.path()).unwrap();
    writeln!(
        file,
        r#"
[plant]
cell_count = 3

[telemetry]
interval = 10
topic_prefix = "line-b/cell"
"#
    )
    .unwrap();
    file.flush().unwrap();

    let loaded = AppConfig::load_with_source(&[missing, file.path().to_path_buf()]).unwrap();
    assert_eq!(loaded.source, file.path());
    assert_eq!(loaded.config.plant.cell_count, 3);
    assert_eq!(loaded.config.telemetry.interval, Duration::from_secs(10));
    assert_eq!(loaded.config.telemetry.topic_prefix, "line-b/cell");
}

#[test]
fn load_reports_inspected_candidates() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nowhere.toml");
    let err = AppConfig::load(&[missing]).unwrap_err();
    assert!(err.to_string().contains("nowhere.toml"));
}

#[test]
fn invalid_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[plant]\nideal_cycle_time_secs = -1.0").unwrap();
    file.flush().unwrap();
    assert!(AppConfig::load(&[file.path()]).is_err());
}

#[test]
fn shipped_config_matches_defaults() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/oee-sim.toml");
    let config = AppConfig::load(&[path]).unwrap();
    let defaults = AppConfig::default();
    assert_eq!(config.plant.cell_count, defaults.plant.cell_count);
    assert_eq!(config.plant.products, defaults.plant.products);
    assert_eq!(config.simulation.random_seed, defaults.simulation.random_seed);
    assert_eq!(config.simulation.tick_interval, Duration::from_secs(1));
    assert_eq!(config.telemetry.interval, Duration::from_secs(5));
    assert_eq!(config.simulation.quality_band, defaults.simulation.quality_band);
}
