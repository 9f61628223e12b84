//! Configuration loading, validation, and defaults.
//!
//! YAML on disk, validated on load, with a small set of environment-variable
//! overrides for deployment convenience -- following the teacher's
//! `config.rs` shape (a `Config` struct with nested sub-configs, `load`,
//! `validate`, and `save_to_file`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HYSTERESIS_DELAY_S, DEFAULT_HYSTERESIS_THRESHOLD_A, DEFAULT_MEASUREMENT_INTERVAL_S,
    DEFAULT_RAMP_UP_DELAY_S, DEFAULT_TOTAL_CURRENT_LIMIT_A, DEFAULT_VOLTAGE_V,
    HYSTERESIS_THRESHOLD_MAX_A, HYSTERESIS_THRESHOLD_MIN_A, RAMP_UP_DELAY_MAX_S,
    RAMP_UP_DELAY_MIN_S,
};
use crate::error::{LoadCtlError, Result};
use crate::station::StationConfig;

/// Operating mode: whether the budget is capped by PV surplus alone, or by
/// the full grid-connected current limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    PvOnly,
    PvPlusGrid,
}

impl Mode {
    /// Parse an operator-supplied mode string, accepting the canonical
    /// values and their on/off aliases. Rejects everything else.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pv_only" | "pv-only" | "off" => Ok(Mode::PvOnly),
            "pv_plus_grid" | "pv-plus-grid" | "on" => Ok(Mode::PvPlusGrid),
            other => Err(LoadCtlError::validation(
                "mode",
                &format!("unrecognized mode '{other}'"),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::PvOnly => "pv_only",
            Mode::PvPlusGrid => "pv_plus_grid",
        }
    }
}

/// `{total_current_limit_a, voltage_v, phases}`; `watts_per_amp = voltage_v
/// * phases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_total_current_limit")]
    pub total_current_limit_a: u32,
    #[serde(default = "default_voltage")]
    pub voltage_v: u32,
    #[serde(default = "default_phases")]
    pub phases: u32,
}

fn default_total_current_limit() -> u32 {
    DEFAULT_TOTAL_CURRENT_LIMIT_A
}
fn default_voltage() -> u32 {
    DEFAULT_VOLTAGE_V
}
fn default_phases() -> u32 {
    1
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total_current_limit_a: DEFAULT_TOTAL_CURRENT_LIMIT_A,
            voltage_v: DEFAULT_VOLTAGE_V,
            phases: 1,
        }
    }
}

impl BudgetConfig {
    pub fn watts_per_amp(&self) -> f64 {
        f64::from(self.voltage_v) * f64::from(self.phases)
    }

    fn validate(&self) -> Result<()> {
        if self.total_current_limit_a == 0 {
            return Err(LoadCtlError::validation(
                "budget.total_current_limit_a",
                "must be greater than zero",
            ));
        }
        if self.voltage_v == 0 {
            return Err(LoadCtlError::validation(
                "budget.voltage_v",
                "must be greater than zero",
            ));
        }
        if self.phases == 0 {
            return Err(LoadCtlError::validation(
                "budget.phases",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Tunable parameters the mode/parameter controller may adjust at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tunables {
    #[serde(default = "default_hysteresis_threshold")]
    pub hysteresis_threshold_a: f64,
    #[serde(default = "default_hysteresis_delay")]
    pub hysteresis_delay_s: f64,
    #[serde(default = "default_ramp_up_delay")]
    pub ramp_up_delay_s: f64,
    #[serde(default = "default_measurement_interval")]
    pub measurement_interval_s: f64,
}

fn default_hysteresis_threshold() -> f64 {
    DEFAULT_HYSTERESIS_THRESHOLD_A
}
fn default_hysteresis_delay() -> f64 {
    DEFAULT_HYSTERESIS_DELAY_S
}
fn default_ramp_up_delay() -> f64 {
    DEFAULT_RAMP_UP_DELAY_S
}
fn default_measurement_interval() -> f64 {
    DEFAULT_MEASUREMENT_INTERVAL_S
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            hysteresis_threshold_a: DEFAULT_HYSTERESIS_THRESHOLD_A,
            hysteresis_delay_s: DEFAULT_HYSTERESIS_DELAY_S,
            ramp_up_delay_s: DEFAULT_RAMP_UP_DELAY_S,
            measurement_interval_s: DEFAULT_MEASUREMENT_INTERVAL_S,
        }
    }
}

impl Tunables {
    fn validate(&self) -> Result<()> {
        if self.hysteresis_threshold_a < HYSTERESIS_THRESHOLD_MIN_A
            || self.hysteresis_threshold_a > HYSTERESIS_THRESHOLD_MAX_A
        {
            return Err(LoadCtlError::validation(
                "tunables.hysteresis_threshold_a",
                &format!(
                    "must be between {HYSTERESIS_THRESHOLD_MIN_A} and {HYSTERESIS_THRESHOLD_MAX_A}"
                ),
            ));
        }
        if self.hysteresis_delay_s < 0.0 {
            return Err(LoadCtlError::validation(
                "tunables.hysteresis_delay_s",
                "must be nonnegative",
            ));
        }
        if self.ramp_up_delay_s < RAMP_UP_DELAY_MIN_S || self.ramp_up_delay_s > RAMP_UP_DELAY_MAX_S
        {
            return Err(LoadCtlError::validation(
                "tunables.ramp_up_delay_s",
                &format!("must be between {RAMP_UP_DELAY_MIN_S} and {RAMP_UP_DELAY_MAX_S}"),
            ));
        }
        if self.measurement_interval_s <= 0.0 {
            return Err(LoadCtlError::validation(
                "tunables.measurement_interval_s",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Logging configuration, in the style of the teacher's `LoggingConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: None,
            json: false,
        }
    }
}

/// HTTP operator surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_web_port")]
    pub port: u16,
    #[serde(default = "default_web_host")]
    pub host: String,
}

fn default_web_port() -> u16 {
    8080
}
fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_web_port(),
            host: default_web_host(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub tunables: Tunables,
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default = "default_enable_charging")]
    pub enable_charging: bool,
    #[serde(default)]
    pub stations: Vec<StationConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub persistence_path: Option<String>,
}

fn default_mode() -> Mode {
    Mode::PvOnly
}
fn default_enable_charging() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            budget: BudgetConfig::default(),
            tunables: Tunables::default(),
            mode: default_mode(),
            enable_charging: default_enable_charging(),
            stations: Vec::new(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            persistence_path: None,
        }
    }
}

impl Config {
    /// Load from a YAML file, then apply environment variable overrides,
    /// then validate. Any failure here is a startup failure (§6.4): the
    /// caller should treat `Err` as fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// A handful of operationally useful overrides, matching the teacher's
    /// practice of letting a few high-churn settings be supplied via the
    /// environment without editing the YAML file.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PVLOADCTL_TOTAL_CURRENT_LIMIT_A")
            && let Ok(parsed) = v.parse()
        {
            self.budget.total_current_limit_a = parsed;
        }
        if let Ok(v) = std::env::var("PVLOADCTL_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("PVLOADCTL_WEB_PORT")
            && let Ok(parsed) = v.parse()
        {
            self.web.port = parsed;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.budget.validate()?;
        self.tunables.validate()?;
        if self.stations.is_empty() {
            return Err(LoadCtlError::config("at least one station must be configured"));
        }
        let mut seen = std::collections::HashSet::new();
        for station in &self.stations {
            if !seen.insert(&station.id) {
                return Err(LoadCtlError::config(format!(
                    "duplicate station id '{}'",
                    station.id
                )));
            }
        }
        Ok(())
    }
}
