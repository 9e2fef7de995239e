use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use ndarray::Array1;

use crate::domain::{Client, TariffMode};
use crate::error::{OptimizerError, Result};

const MINUTES_PER_WEEK: i64 = 7 * 24 * 60;

/// Horizon-aligned forecast and constraint vectors consumed by the solver
/// and the simulators.
///
/// Every vector has length N when present; `None` means "not yet supplied"
/// so the context can be built incrementally. Consumers requiring a field
/// ask for it through the `require_*` accessors, which name the missing
/// field in their error.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalContext {
    n: usize,
    step_minutes: u32,
    reference_datetime: NaiveDateTime,
    prices_purchase: Option<Array1<f64>>,
    prices_sell: Option<Array1<f64>>,
    solar_production: Option<Array1<f64>>,
    house_consumption: Option<Array1<f64>>,
    water_draws: Option<Array1<f64>>,
    future_setpoints: Option<Array1<f64>>,
    availability_on: Option<Array1<f64>>,
    off_peak_hours: Option<Array1<f64>>,
}

macro_rules! context_vector {
    ($field:ident, $setter:ident, $require:ident) => {
        pub fn $field(&self) -> Option<&Array1<f64>> {
            self.$field.as_ref()
        }

        pub fn $setter(&mut self, values: Option<Array1<f64>>) -> Result<()> {
            if let Some(ref v) = values {
                self.check_vector(v)?;
            }
            self.$field = values;
            Ok(())
        }

        pub fn $require(&self) -> Result<&Array1<f64>> {
            self.$field
                .as_ref()
                .ok_or(OptimizerError::MissingData(stringify!($field)))
        }
    };
}

impl ExternalContext {
    pub fn new(n: usize, step_minutes: u32, reference_datetime: NaiveDateTime) -> Result<Self> {
        if n == 0 {
            return Err(OptimizerError::validation(
                "the horizon must contain at least one step",
            ));
        }
        if step_minutes == 0 {
            return Err(OptimizerError::validation(
                "the step must be at least one minute",
            ));
        }
        Ok(Self {
            n,
            step_minutes,
            reference_datetime,
            prices_purchase: None,
            prices_sell: None,
            solar_production: None,
            house_consumption: None,
            water_draws: None,
            future_setpoints: None,
            availability_on: None,
            off_peak_hours: None,
        })
    }

    fn check_vector(&self, values: &Array1<f64>) -> Result<()> {
        if values.len() != self.n {
            return Err(OptimizerError::Dimension {
                expected: self.n,
                actual: values.len(),
            });
        }
        Ok(())
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    pub fn reference_datetime(&self) -> NaiveDateTime {
        self.reference_datetime
    }

    context_vector!(prices_purchase, set_prices_purchase, require_prices_purchase);
    context_vector!(prices_sell, set_prices_sell, require_prices_sell);
    context_vector!(solar_production, set_solar_production, require_solar_production);
    context_vector!(house_consumption, set_house_consumption, require_house_consumption);
    context_vector!(water_draws, set_water_draws, require_water_draws);
    context_vector!(future_setpoints, set_future_setpoints, require_future_setpoints);
    context_vector!(availability_on, set_availability_on, require_availability_on);
    context_vector!(off_peak_hours, set_off_peak_hours, require_off_peak_hours);

    /// Assembles the full context for a client over
    /// `[reference_datetime, reference_datetime + horizon_hours)`.
    ///
    /// The solar vector, when given, is assumed already aligned to the
    /// horizon grid (the service takes care of resampling).
    pub fn from_client(
        client: &Client,
        reference_datetime: NaiveDateTime,
        solar_production: Option<Array1<f64>>,
        horizon_hours: u32,
        step_minutes: u32,
    ) -> Result<Self> {
        if horizon_hours == 0 || horizon_hours > 48 {
            return Err(OptimizerError::validation(format!(
                "horizon must be between 1 and 48 hours, got {horizon_hours}"
            )));
        }
        if step_minutes == 0 || step_minutes * 2 > horizon_hours * 60 {
            return Err(OptimizerError::validation(format!(
                "step ({step_minutes} min) must be positive and at most half the horizon"
            )));
        }

        let n = (horizon_hours * 60 / step_minutes) as usize;
        let mut context = Self::new(n, step_minutes, reference_datetime)?;

        if let Some(ref solar) = solar_production {
            context.check_vector(solar)?;
        }

        // Per-step scans over the horizon grid: purchase price, availability
        // and the off-peak mask all depend only on the time of day.
        let mut prices = Array1::zeros(n);
        let mut availability = Array1::zeros(n);
        let mut off_peak = Array1::ones(n);
        let peak_slots = match client.prices.mode() {
            TariffMode::PeakOffPeak => client.prices.peak_slots()?.to_vec(),
            TariffMode::Base => Vec::new(),
        };
        for i in 0..n {
            let instant =
                reference_datetime + Duration::minutes(i as i64 * step_minutes as i64);
            let moment = instant.time();
            prices[i] = client.prices.current_purchase_price(moment);
            if client.constraints.is_allowed(moment) {
                availability[i] = 1.0;
            }
            if peak_slots.iter().any(|slot| slot.contains(moment)) {
                off_peak[i] = 0.0;
            }
        }

        let prices_sell = Array1::from_elem(n, client.prices.resale());

        let house_consumption = Array1::from_vec(client.constraints.consumption_profile().vector(
            reference_datetime,
            n,
            step_minutes,
        ));

        // Planning events land in the step bucket containing their forward
        // gap from the reference instant, wrapping over the week boundary.
        let mut water_draws = Array1::zeros(n);
        let mut future_setpoints =
            Array1::from_elem(n, client.constraints.minimum_temperature());

        let anchor_day = reference_datetime.weekday().num_days_from_monday() as u8;
        let anchor_minutes = anchor_day as i64 * 1440
            + reference_datetime.hour() as i64 * 60
            + reference_datetime.minute() as i64;

        let events =
            client
                .planning
                .future_setpoints(anchor_day, reference_datetime.time(), horizon_hours);
        for event in events {
            let mut delta_minutes = event.week_minutes() as i64 - anchor_minutes;
            if delta_minutes < 0 {
                delta_minutes += MINUTES_PER_WEEK;
            }
            let idx = (delta_minutes / step_minutes as i64) as usize;
            if idx < n {
                water_draws[idx] += event.drawn_volume();
                future_setpoints[idx] = future_setpoints[idx].max(event.temperature());
            }
        }

        context.set_prices_purchase(Some(prices))?;
        context.set_prices_sell(Some(prices_sell))?;
        context.set_solar_production(solar_production)?;
        context.set_house_consumption(Some(house_consumption))?;
        context.set_water_draws(Some(water_draws))?;
        context.set_future_setpoints(Some(future_setpoints))?;
        context.set_availability_on(Some(availability))?;
        context.set_off_peak_hours(Some(off_peak))?;

        Ok(context)
    }
}
