use chrono::{Duration as ChronoDuration, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::EngineConfig;
use crate::domain::Client;
use crate::engine::context::ExternalContext;
use crate::engine::forecast::ForecastSeries;
use crate::engine::inputs::OptimizationInputs;
use crate::engine::solver::Solver;
use crate::engine::system_config::SystemConfig;
use crate::engine::trajectory::{RouterMode, StandardHeaterMode, TrajectorySystem};
use crate::error::{OptimizerError, Result};

/// End-to-end facade: normalizes the forecast, assembles the run context and
/// produces a trajectory, either solver-optimized or simulated.
///
/// One service call is one synchronous run; concurrent runs each own their
/// inputs and trajectory.
pub struct OptimizerService {
    horizon_hours: u32,
    step_minutes: u32,
    solver_timeout: Duration,
}

impl OptimizerService {
    pub const MIN_STEP_MINUTES: u32 = 5;
    pub const MIN_HORIZON_HOURS: u32 = 1;
    pub const MAX_HORIZON_HOURS: u32 = 48;
    pub const MIN_TANK_TEMPERATURE: f64 = 5.0;
    pub const MAX_TANK_TEMPERATURE: f64 = 99.0;

    pub fn new(horizon_hours: u32, step_minutes: u32) -> Result<Self> {
        let mut service = Self {
            horizon_hours: 24,
            step_minutes: 15,
            solver_timeout: Duration::from_secs(60),
        };
        service.set_horizon_hours(horizon_hours)?;
        service.set_step_minutes(step_minutes)?;
        Ok(service)
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut service = Self::new(
            config.optimization.horizon_hours,
            config.optimization.step_minutes,
        )?;
        service.solver_timeout = Duration::from_secs(config.solver.timeout_secs);
        Ok(service)
    }

    pub fn horizon_hours(&self) -> u32 {
        self.horizon_hours
    }

    pub fn set_horizon_hours(&mut self, value: u32) -> Result<()> {
        if !(Self::MIN_HORIZON_HOURS..=Self::MAX_HORIZON_HOURS).contains(&value) {
            return Err(OptimizerError::validation(format!(
                "horizon must be between {} and {} hours, got {value}",
                Self::MIN_HORIZON_HOURS,
                Self::MAX_HORIZON_HOURS
            )));
        }
        self.horizon_hours = value;
        Ok(())
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    pub fn set_step_minutes(&mut self, value: u32) -> Result<()> {
        if value < Self::MIN_STEP_MINUTES {
            return Err(OptimizerError::validation(format!(
                "step cannot go below {} minutes, got {value}",
                Self::MIN_STEP_MINUTES
            )));
        }
        if value * 2 > self.horizon_hours * 60 {
            return Err(OptimizerError::validation(format!(
                "step ({value} min) cannot exceed half the horizon ({}h)",
                self.horizon_hours
            )));
        }
        self.step_minutes = value;
        Ok(())
    }

    /// Number of steps on the current grid.
    pub fn n(&self) -> usize {
        (self.horizon_hours * 60 / self.step_minutes) as usize
    }

    /// Runs the full optimization pipeline for one client.
    pub fn trajectory_of_client(
        &self,
        client: &Client,
        start: NaiveDateTime,
        initial_temperature: f64,
        forecast: &ForecastSeries,
    ) -> Result<TrajectorySystem> {
        let (system_config, context) = self.prepare(client, start, initial_temperature, forecast)?;
        let inputs = OptimizationInputs::new(
            system_config,
            context,
            initial_temperature,
            client.features.mode,
        )?;
        info!(
            client_id = client.client_id,
            %start,
            "running solver trajectory"
        );
        Solver::new(self.solver_timeout).solve(&inputs)
    }

    /// Baseline comparison: plain thermostat simulation, no solver.
    pub fn trajectory_of_client_standard(
        &self,
        client: &Client,
        start: NaiveDateTime,
        initial_temperature: f64,
        forecast: &ForecastSeries,
        mode: StandardHeaterMode,
        setpoint_temperature: Option<f64>,
    ) -> Result<TrajectorySystem> {
        let (system_config, context) = self.prepare(client, start, initial_temperature, forecast)?;
        info!(
            client_id = client.client_id,
            %start,
            "running standard thermostat simulation"
        );
        TrajectorySystem::generate_standard_trajectory(
            context,
            system_config,
            initial_temperature,
            mode,
            setpoint_temperature,
        )
    }

    /// Baseline comparison: PV router simulation, no solver.
    pub fn trajectory_of_client_router(
        &self,
        client: &Client,
        start: NaiveDateTime,
        initial_temperature: f64,
        forecast: &ForecastSeries,
        mode: RouterMode,
        setpoint_temperature: Option<f64>,
    ) -> Result<TrajectorySystem> {
        let (system_config, context) = self.prepare(client, start, initial_temperature, forecast)?;
        info!(
            client_id = client.client_id,
            %start,
            "running router simulation"
        );
        TrajectorySystem::generate_router_only_trajectory(
            context,
            system_config,
            initial_temperature,
            mode,
            setpoint_temperature,
        )
    }

    /// Shared steps 1-3 of every pipeline: forecast validation and
    /// resampling, then configuration and context assembly.
    fn prepare(
        &self,
        client: &Client,
        start: NaiveDateTime,
        initial_temperature: f64,
        forecast: &ForecastSeries,
    ) -> Result<(Arc<SystemConfig>, Arc<ExternalContext>)> {
        self.check_tank_temperature(initial_temperature)?;

        let end = start + ChronoDuration::hours(self.horizon_hours as i64);
        forecast.validate_coverage(start, end, 4 * self.step_minutes)?;
        let solar = forecast.resample(start, self.n(), self.step_minutes);

        let system_config = Arc::new(SystemConfig::from_client(client)?);
        let context = Arc::new(ExternalContext::from_client(
            client,
            start,
            Some(solar),
            self.horizon_hours,
            self.step_minutes,
        )?);
        Ok((system_config, context))
    }

    fn check_tank_temperature(&self, temperature: f64) -> Result<()> {
        if !temperature.is_finite()
            || !(Self::MIN_TANK_TEMPERATURE..=Self::MAX_TANK_TEMPERATURE).contains(&temperature)
        {
            return Err(OptimizerError::validation(format!(
                "tank temperature must be between {} and {} degrees C, got {temperature}",
                Self::MIN_TANK_TEMPERATURE,
                Self::MAX_TANK_TEMPERATURE
            )));
        }
        Ok(())
    }
}

impl Default for OptimizerService {
    fn default() -> Self {
        Self::new(24, 15).expect("default horizon settings are valid")
    }
}
