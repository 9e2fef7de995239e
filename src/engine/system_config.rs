use crate::domain::Client;
use crate::error::{OptimizerError, Result};

/// Fixed upper safety temperature applied when projecting a client, degrees C.
const T_MAX_SAFE: f64 = 95.0;

/// Projection of a client onto the physical scalars the solver and the
/// simulators consume. Nothing here changes over a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    /// Nominal element power, watts.
    pub power: f64,
    /// Tank capacity, litres.
    pub volume: f64,
    /// Standing loss, degrees C per minute.
    pub heat_loss_coefficient: f64,
    /// Inlet cold water temperature, degrees C.
    pub cold_water_temperature: f64,
    /// Whether decisions may take fractional values in [0,1].
    pub gradation: bool,
    /// Lower safety bound, degrees C.
    pub t_min_safe: f64,
    /// Upper safety bound, degrees C.
    pub t_max_safe: f64,
}

impl SystemConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        power: f64,
        volume: f64,
        heat_loss_coefficient: f64,
        cold_water_temperature: f64,
        gradation: bool,
        t_min_safe: f64,
        t_max_safe: f64,
    ) -> Result<Self> {
        if !power.is_finite() || power <= 0.0 {
            return Err(OptimizerError::validation(format!(
                "system power must be positive, got {power}"
            )));
        }
        if !volume.is_finite() || volume <= 0.0 {
            return Err(OptimizerError::validation(format!(
                "system volume must be positive, got {volume}"
            )));
        }
        if !heat_loss_coefficient.is_finite() || heat_loss_coefficient < 0.0 {
            return Err(OptimizerError::validation(format!(
                "heat loss coefficient must be non-negative, got {heat_loss_coefficient}"
            )));
        }
        if !(0.0..=60.0).contains(&cold_water_temperature) {
            return Err(OptimizerError::validation(format!(
                "cold water temperature must be between 0 and 60, got {cold_water_temperature}"
            )));
        }
        if !(0.0..=95.0).contains(&t_min_safe) {
            return Err(OptimizerError::validation(format!(
                "minimum safety temperature must be between 0 and 95, got {t_min_safe}"
            )));
        }
        if !(50.0..=100.0).contains(&t_max_safe) {
            return Err(OptimizerError::validation(format!(
                "maximum safety temperature must be between 50 and 100, got {t_max_safe}"
            )));
        }
        Ok(Self {
            power,
            volume,
            heat_loss_coefficient,
            cold_water_temperature,
            gradation,
            t_min_safe,
            t_max_safe,
        })
    }

    pub fn from_client(client: &Client) -> Result<Self> {
        let heater = &client.water_heater;
        Self::new(
            heater.power(),
            heater.volume(),
            heater.insulation(),
            heater.cold_water(),
            client.features.gradation,
            client.constraints.minimum_temperature(),
            T_MAX_SAFE,
        )
    }

    /// Temperature gain for one full-power step of `step_minutes`, degrees C.
    pub fn gain_per_step(&self, step_minutes: u32) -> f64 {
        (self.power * step_minutes as f64 * 60.0)
            / (self.volume * crate::domain::WATER_HEAT_CAPACITY)
    }

    /// Standing loss over one step of `step_minutes`, degrees C.
    pub fn loss_per_step(&self, step_minutes: u32) -> f64 {
        self.heat_loss_coefficient * step_minutes as f64
    }
}
