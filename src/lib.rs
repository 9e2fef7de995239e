//! Optimal control trajectories for a domestic electric water heater
//! co-located with solar PV production.
//!
//! Given a client configuration (heater physics, tariff, weekly schedule,
//! consumption profile, constraints), a start instant, an initial tank
//! temperature and a horizon-aligned solar forecast, the engine emits a
//! step-by-step decision vector plus derived temperature, import and export
//! flows — either by solving a linear program (cost or self-consumption
//! objective) or by simulating a standard thermostat / PV-router baseline.
//!
//! Typical entry point:
//!
//! ```no_run
//! use solar_heater_optimizer::domain::Client;
//! use solar_heater_optimizer::engine::{ForecastSeries, OptimizerService};
//!
//! # fn run(yaml: &str, forecast: ForecastSeries) -> solar_heater_optimizer::error::Result<()> {
//! let client = Client::from_yaml(yaml)?;
//! let service = OptimizerService::new(24, 15)?;
//! let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
//!     .unwrap()
//!     .and_hms_opt(6, 0, 0)
//!     .unwrap();
//! let mut trajectory = service.trajectory_of_client(&client, start, 45.0, &forecast)?;
//! println!("cost over the horizon: {:.2}", trajectory.compute_cost()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod repo;
pub mod telemetry;

pub use config::EngineConfig;
pub use error::OptimizerError;
