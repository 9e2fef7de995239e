use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct EngineConfig {
    #[validate(nested)]
    pub optimization: OptimizationConfig,

    #[validate(nested)]
    pub solver: SolverConfig,

    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

/// Horizon discretization settings.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct OptimizationConfig {
    /// Length of the optimization window in hours.
    #[validate(range(min = 1, max = 48))]
    pub horizon_hours: u32,

    /// Step resolution in minutes.
    #[validate(range(min = 5, max = 60))]
    pub step_minutes: u32,
}

/// Solver backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SolverConfig {
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            optimization: OptimizationConfig {
                horizon_hours: 24,
                step_minutes: 15,
            },
            solver: SolverConfig {
                timeout_secs: default_timeout_secs(),
            },
            telemetry: TelemetryConfig {
                log_level: default_log_level(),
                log_json: false,
            },
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML files and environment variables.
    ///
    /// Configuration is loaded in this order (later overrides earlier):
    /// 1. config/default.toml (base configuration)
    /// 2. Environment variables with SHO__ prefix (SHO__SOLVER__TIMEOUT_SECS -> solver.timeout_secs)
    pub fn load() -> Result<Self> {
        let config: EngineConfig = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("SHO__").split("__"))
            .extract()
            .context("Failed to parse configuration")?;

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }
}
