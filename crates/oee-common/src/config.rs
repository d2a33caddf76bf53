//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Typed TOML configuration for plant, simulation, telemetry and servers."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_cell_count() -> usize {
    20
}

fn default_id_prefix() -> String {
    "C".to_owned()
}

fn default_name_prefix() -> String {
    "Célula de Produção".to_owned()
}

fn default_ideal_cycle_time() -> f64 {
    10.0
}

fn default_target_units() -> u64 {
    5000
}

fn default_initial_product() -> String {
    "PRATO-FUNDO-BRANCO".to_owned()
}

fn default_products() -> Vec<String> {
    [
        "PRATO-FUNDO-BRANCO",
        "XICARA-CAFE-PRETO",
        "BOWL-CERAMICA-AZUL",
        "PRATO-RASO-VERDE",
    ]
    .iter()
    .map(|product| (*product).to_owned())
    .collect()
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_factor_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_simulation_seed() -> u64 {
    0x0EE5_u64
}

fn default_performance_band() -> FactorBand {
    FactorBand { min: 0.8, max: 1.1 }
}

fn default_quality_band() -> FactorBand {
    FactorBand {
        min: 0.90,
        max: 0.99,
    }
}

fn default_status_change_probability() -> f64 {
    0.05
}

fn default_recovery_probability() -> f64 {
    0.30
}

fn default_product_change_probability() -> f64 {
    0.02
}

fn default_warning_threshold() -> f64 {
    60.0
}

fn default_telemetry_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_topic_prefix() -> String {
    "porto-brasil/cell".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_broker_url() -> String {
    "nats://127.0.0.1:4222".to_owned()
}

fn default_persistence_directory() -> PathBuf {
    PathBuf::from("target/oee-snapshots")
}

fn default_persistence_file() -> String {
    "oee_snapshots.jsonl".to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9898))
}

fn default_api_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

/// Primary configuration object for the simulator daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub plant: PlantConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "OEE_SIM_CONFIG";

    /// Load configuration from disk, respecting the `OEE_SIM_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.plant.validate()?;
        self.simulation.validate()?;
        if self.telemetry.interval <= self.simulation.tick_interval {
            return Err(anyhow!(
                "telemetry interval ({:?}) must be longer than the production tick ({:?})",
                self.telemetry.interval,
                self.simulation.tick_interval
            ));
        }
        if self.telemetry.queue_capacity == 0 {
            return Err(anyhow!("telemetry queue_capacity must be positive"));
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Fixed layout of the plant floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantConfig {
    #[serde(default = "default_cell_count")]
    pub cell_count: usize,
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_ideal_cycle_time")]
    pub ideal_cycle_time_secs: f64,
    #[serde(default = "default_target_units")]
    pub target_units: u64,
    #[serde(default = "default_initial_product")]
    pub initial_product: String,
    #[serde(default = "default_products")]
    pub products: Vec<String>,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            cell_count: default_cell_count(),
            id_prefix: default_id_prefix(),
            name_prefix: default_name_prefix(),
            ideal_cycle_time_secs: default_ideal_cycle_time(),
            target_units: default_target_units(),
            initial_product: default_initial_product(),
            products: default_products(),
        }
    }
}

impl PlantConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cell_count == 0 || self.cell_count > 99 {
            return Err(anyhow!(
                "plant cell_count must be between 1 and 99, got {}",
                self.cell_count
            ));
        }
        if !(self.ideal_cycle_time_secs.is_finite() && self.ideal_cycle_time_secs > 0.0) {
            return Err(anyhow!("plant ideal_cycle_time_secs must be positive"));
        }
        if self.target_units == 0 {
            return Err(anyhow!("plant target_units must be positive"));
        }
        if self.products.is_empty() {
            return Err(anyhow!("plant products catalogue must not be empty"));
        }
        Ok(())
    }
}

/// Closed-open band a simulation factor is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorBand {
    pub min: f64,
    pub max: f64,
}

impl FactorBand {
    fn validate(&self, label: &str) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min <= 0.0 {
            return Err(anyhow!("{label} band must be positive and finite"));
        }
        if self.min > self.max {
            return Err(anyhow!(
                "{label} band is inverted (min {} > max {})",
                self.min,
                self.max
            ));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_interval", rename = "tick_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    #[serde(default = "default_factor_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub factor_interval: Duration,
    #[serde(default = "default_simulation_seed")]
    pub random_seed: u64,
    #[serde(default = "default_performance_band")]
    pub performance_band: FactorBand,
    #[serde(default = "default_quality_band")]
    pub quality_band: FactorBand,
    #[serde(default = "default_status_change_probability")]
    pub status_change_probability: f64,
    #[serde(default = "default_recovery_probability")]
    pub recovery_probability: f64,
    #[serde(default = "default_product_change_probability")]
    pub product_change_probability: f64,
    #[serde(default = "default_warning_threshold")]
    pub warning_oee_threshold: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            factor_interval: default_factor_interval(),
            random_seed: default_simulation_seed(),
            performance_band: default_performance_band(),
            quality_band: default_quality_band(),
            status_change_probability: default_status_change_probability(),
            recovery_probability: default_recovery_probability(),
            product_change_probability: default_product_change_probability(),
            warning_oee_threshold: default_warning_threshold(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(anyhow!("simulation tick_interval_ms must be positive"));
        }
        if self.factor_interval.is_zero() {
            return Err(anyhow!("simulation factor_interval must be positive"));
        }
        self.performance_band.validate("performance")?;
        self.quality_band.validate("quality")?;
        if self.quality_band.max > 1.0 {
            return Err(anyhow!("quality band must stay within (0, 1]"));
        }
        for (label, value) in [
            ("status_change_probability", self.status_change_probability),
            ("recovery_probability", self.recovery_probability),
            ("product_change_probability", self.product_change_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("simulation {label} must be within [0, 1], got {value}"));
            }
        }
        if !(0.0..=100.0).contains(&self.warning_oee_threshold) {
            return Err(anyhow!("simulation warning_oee_threshold must be a percentage"));
        }
        Ok(())
    }
}

/// Pub/sub backend the telemetry publisher forwards to.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// Payloads are logged and dropped.
    #[default]
    None,
    Nats,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default = "default_true")]
    pub publish_per_piece: bool,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub broker: BrokerKind,
    #[serde(default = "default_broker_url")]
    pub broker_url: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval: default_telemetry_interval(),
            topic_prefix: default_topic_prefix(),
            publish_per_piece: true,
            queue_capacity: default_queue_capacity(),
            broker: BrokerKind::default(),
            broker_url: default_broker_url(),
        }
    }
}

impl TelemetryConfig {
    pub const ENV_BROKER_URL: &str = "OEE_SIM_BROKER_URL";

    /// Broker URL, honouring the `OEE_SIM_BROKER_URL` override.
    pub fn effective_broker_url(&self) -> String {
        match std::env::var(Self::ENV_BROKER_URL) {
            Ok(url) if !url.trim().is_empty() => url,
            _ => self.broker_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_persistence_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_persistence_file")]
    pub file_name: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_persistence_directory(),
            file_name: default_persistence_file(),
        }
    }
}

impl PersistenceConfig {
    pub fn log_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_metrics_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_api_listen(),
        }
    }
}
