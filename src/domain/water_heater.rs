use crate::error::{OptimizerError, Result};

/// Specific heat capacity of water, J/kg/K. One litre of tank water is
/// treated as one kilogram.
pub const WATER_HEAT_CAPACITY: f64 = 4185.0;

/// Physical model of the tank and its resistive element.
///
/// `insulation` is a fixed temperature loss in degrees C per minute, the
/// piecewise-linear simplification the solver shares with the simulators.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterHeater {
    volume: f64,
    power: f64,
    insulation: f64,
    cold_water: f64,
}

impl WaterHeater {
    pub fn new(volume: f64, power: f64) -> Result<Self> {
        let mut heater = Self {
            volume: 0.0,
            power: 0.0,
            insulation: 0.0,
            cold_water: 10.0,
        };
        heater.set_volume(volume)?;
        heater.set_power(power)?;
        Ok(heater)
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn set_volume(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() || value <= 0.0 {
            return Err(OptimizerError::validation(format!(
                "tank volume must be a positive number of litres, got {value}"
            )));
        }
        self.volume = value;
        Ok(())
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn set_power(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() || value <= 0.0 {
            return Err(OptimizerError::validation(format!(
                "heater power must be a positive number of watts, got {value}"
            )));
        }
        self.power = value;
        Ok(())
    }

    pub fn insulation(&self) -> f64 {
        self.insulation
    }

    pub fn set_insulation(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(OptimizerError::validation(format!(
                "insulation coefficient must be non-negative (degrees C per minute), got {value}"
            )));
        }
        self.insulation = value;
        Ok(())
    }

    pub fn cold_water(&self) -> f64 {
        self.cold_water
    }

    pub fn set_cold_water(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() || !(0.0..=60.0).contains(&value) {
            return Err(OptimizerError::validation(format!(
                "cold water temperature must be between 0 and 60 degrees C, got {value}"
            )));
        }
        self.cold_water = value;
        Ok(())
    }

    /// Temperature after running the element at rate `x in [0,1]` for
    /// `dt_minutes`: T + (P*x*dt) / (M*Cp).
    pub fn heating_temperature(&self, temperature: f64, rate: f64, dt_minutes: f64) -> f64 {
        let energy_joules = self.power * rate * dt_minutes * 60.0;
        temperature + energy_joules / (self.volume * WATER_HEAT_CAPACITY)
    }

    /// Temperature after mixing a draw of `drawn_volume` litres with inlet
    /// cold water. The renewal ratio saturates at 1 (tank fully flushed).
    pub fn draw_temperature(&self, temperature: f64, drawn_volume: f64) -> f64 {
        let rho = (drawn_volume / self.volume).min(1.0);
        temperature * (1.0 - rho) + self.cold_water * rho
    }

    /// Temperature after standing losses over `dt_minutes`.
    pub fn loss(&self, temperature: f64, dt_minutes: f64) -> f64 {
        temperature - self.insulation * dt_minutes
    }

    /// One simulation step: draw, then heat, then lose.
    pub fn temperature_after_step(
        &self,
        temperature: f64,
        rate: f64,
        dt_minutes: f64,
        drawn_volume: f64,
    ) -> f64 {
        let mixed = self.draw_temperature(temperature, drawn_volume);
        let heated = self.heating_temperature(mixed, rate, dt_minutes);
        self.loss(heated, dt_minutes)
    }
}
