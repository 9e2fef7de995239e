use ndarray::{Array1, Array2};
use std::sync::Arc;

use crate::domain::OptimizationMode;
use crate::engine::context::ExternalContext;
use crate::engine::system_config::SystemConfig;
use crate::error::{OptimizerError, Result};

/// Import penalty of the self-consumption objective.
const ALPHA_IMPORT_PENALTY: f64 = 1000.0;
/// Export penalty of the self-consumption objective.
const BETA_EXPORT_PENALTY: f64 = 1.0;

/// Linear-program formulation of one optimization run.
///
/// The decision vector is laid out `X = [x(N) | T(N+1) | I(N) | E(N)]`,
/// length `4N+1`:
/// - `x[i]` heating rate at step i,
/// - `T[i]` tank temperature at step boundary i (T0 known),
/// - `I[i]`/`E[i]` grid import/export power at step i, watts.
///
/// Matrices, bounds and objectives are derived on demand from the shared
/// configuration and context.
#[derive(Debug, Clone)]
pub struct OptimizationInputs {
    system_config: Arc<SystemConfig>,
    context: Arc<ExternalContext>,
    initial_temperature: f64,
    mode: OptimizationMode,
}

/// Per-variable `(lower, upper)` bounds; `f64::INFINITY` marks an unbounded side.
pub type Bounds = Vec<(f64, f64)>;

impl OptimizationInputs {
    pub fn new(
        system_config: Arc<SystemConfig>,
        context: Arc<ExternalContext>,
        initial_temperature: f64,
        mode: OptimizationMode,
    ) -> Result<Self> {
        if !initial_temperature.is_finite() || !(0.0..=100.0).contains(&initial_temperature) {
            return Err(OptimizerError::validation(format!(
                "initial temperature must be between 0 and 100 degrees C, got {initial_temperature}"
            )));
        }
        Ok(Self {
            system_config,
            context,
            initial_temperature,
            mode,
        })
    }

    pub fn system_config(&self) -> &Arc<SystemConfig> {
        &self.system_config
    }

    pub fn context(&self) -> &Arc<ExternalContext> {
        &self.context
    }

    pub fn initial_temperature(&self) -> f64 {
        self.initial_temperature
    }

    pub fn mode(&self) -> OptimizationMode {
        self.mode
    }

    fn n(&self) -> usize {
        self.context.n()
    }

    /// Number of decision variables, `4N+1`.
    pub fn num_variables(&self) -> usize {
        4 * self.n() + 1
    }

    // -- Equality system -----------------------------------------------------

    /// Full equality matrix, `(2N+1) x (4N+1)`: one initial-condition row,
    /// N thermodynamic rows, N electrical-balance rows.
    pub fn a_eq(&self) -> Result<Array2<f64>> {
        let n = self.n();
        let cols = self.num_variables();
        let mut a = Array2::zeros((2 * n + 1, cols));

        // Initial condition: T0 is pinned. x occupies [0, N), so T0 sits at N.
        a[(0, n)] = 1.0;

        // Thermodynamics, one row per step:
        // T[i+1] - (1 - rho_i) * T[i] - K * x[i] = rho_i * cold - L
        let draws = self.context.require_water_draws()?;
        let gain = self.system_config.gain_per_step(self.context.step_minutes());
        for i in 0..n {
            let rho = draws[i] / self.system_config.volume;
            let row = 1 + i;
            a[(row, i)] = -gain;
            a[(row, n + i)] = -(1.0 - rho);
            a[(row, n + i + 1)] = 1.0;
        }

        // Electrical balance, one row per step:
        // I[i] - E[i] - P * x[i] = house[i] - solar[i]
        for i in 0..n {
            let row = 1 + n + i;
            a[(row, i)] = -self.system_config.power;
            a[(row, 2 * n + 1 + i)] = 1.0;
            a[(row, 3 * n + 1 + i)] = -1.0;
        }

        Ok(a)
    }

    /// Right-hand side matching [`a_eq`](Self::a_eq).
    pub fn b_eq(&self) -> Result<Array1<f64>> {
        let n = self.n();
        let mut b = Array1::zeros(2 * n + 1);

        b[0] = self.initial_temperature;

        let draws = self.context.require_water_draws()?;
        let loss = self.system_config.loss_per_step(self.context.step_minutes());
        let cold = self.system_config.cold_water_temperature;
        for i in 0..n {
            let rho = draws[i] / self.system_config.volume;
            b[1 + i] = rho * cold - loss;
        }

        let house = self.context.require_house_consumption()?;
        let solar = self.context.require_solar_production()?;
        for i in 0..n {
            b[1 + n + i] = house[i] - solar[i];
        }

        Ok(b)
    }

    // -- Bounds --------------------------------------------------------------

    /// Per-variable bounds. Availability caps `x` from above; the future
    /// setpoint vector floors every temperature after T0; flows are only
    /// required to be non-negative.
    pub fn bounds(&self) -> Result<Bounds> {
        let n = self.n();
        let availability = self.context.require_availability_on()?;
        let setpoints = self.context.require_future_setpoints()?;
        let t_max = self.system_config.t_max_safe;

        let mut bounds = Vec::with_capacity(self.num_variables());
        for i in 0..n {
            bounds.push((0.0, availability[i]));
        }
        bounds.push((0.0, t_max)); // T0 is fixed by the equality system anyway
        for i in 0..n {
            bounds.push((setpoints[i], t_max));
        }
        for _ in 0..2 * n {
            bounds.push((0.0, f64::INFINITY));
        }
        Ok(bounds)
    }

    // -- Objectives ----------------------------------------------------------

    /// Cost objective: pay the purchase price on imports, earn the resale
    /// price on exports. Units are W * (currency/kWh); the solver boundary
    /// rescales to currency.
    pub fn cost_objective(&self) -> Result<Array1<f64>> {
        let n = self.n();
        let purchase = self.context.require_prices_purchase()?;
        let sell = self.context.require_prices_sell()?;

        let mut c = Array1::zeros(self.num_variables());
        for i in 0..n {
            c[2 * n + 1 + i] = purchase[i];
            c[3 * n + 1 + i] = -sell[i];
        }
        Ok(c)
    }

    /// Self-consumption objective: strongly penalize imports, gently
    /// penalize exports, so surplus is stored thermally before being sold.
    pub fn self_consumption_objective(&self) -> Array1<f64> {
        let n = self.n();
        let mut c = Array1::zeros(self.num_variables());
        for i in 0..n {
            c[2 * n + 1 + i] = ALPHA_IMPORT_PENALTY;
            c[3 * n + 1 + i] = BETA_EXPORT_PENALTY;
        }
        c
    }

    /// Objective vector selected by the run mode.
    pub fn objective(&self) -> Result<Array1<f64>> {
        match self.mode {
            OptimizationMode::Cost => self.cost_objective(),
            OptimizationMode::SelfConsumption => Ok(self.self_consumption_objective()),
        }
    }

    // -- Integrality ---------------------------------------------------------

    /// Marks the decision variables as integer when gradation is off; their
    /// [0,1] bounds then make them binary. All other variables stay continuous.
    pub fn integrality(&self) -> Vec<bool> {
        let n = self.n();
        let mut flags = vec![false; self.num_variables()];
        if !self.system_config.gradation {
            for flag in flags.iter_mut().take(n) {
                *flag = true;
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::arr1;

    fn context(n: usize) -> ExternalContext {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let mut ctx = ExternalContext::new(n, 15, start).unwrap();
        ctx.set_prices_purchase(Some(Array1::from_elem(n, 0.2))).unwrap();
        ctx.set_prices_sell(Some(Array1::from_elem(n, 0.05))).unwrap();
        ctx.set_solar_production(Some(Array1::zeros(n))).unwrap();
        ctx.set_house_consumption(Some(Array1::from_elem(n, 100.0))).unwrap();
        ctx.set_water_draws(Some(Array1::zeros(n))).unwrap();
        ctx.set_future_setpoints(Some(Array1::from_elem(n, 45.0))).unwrap();
        ctx.set_availability_on(Some(Array1::ones(n))).unwrap();
        ctx.set_off_peak_hours(Some(Array1::ones(n))).unwrap();
        ctx
    }

    fn config(gradation: bool) -> SystemConfig {
        SystemConfig::new(2500.0, 150.0, 0.02, 15.0, gradation, 40.0, 95.0).unwrap()
    }

    fn inputs(n: usize, gradation: bool) -> OptimizationInputs {
        OptimizationInputs::new(
            Arc::new(config(gradation)),
            Arc::new(context(n)),
            50.0,
            OptimizationMode::Cost,
        )
        .unwrap()
    }

    #[test]
    fn test_initial_temperature_bounds() {
        let err = OptimizationInputs::new(
            Arc::new(config(true)),
            Arc::new(context(4)),
            101.0,
            OptimizationMode::Cost,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_equality_system_shape_and_initial_row() {
        let inputs = inputs(4, true);
        let a = inputs.a_eq().unwrap();
        let b = inputs.b_eq().unwrap();
        assert_eq!(a.dim(), (9, 17));
        assert_eq!(b.len(), 9);
        // Initial condition targets T0 only
        assert_eq!(a[(0, 4)], 1.0);
        assert_eq!(a.row(0).iter().filter(|&&v| v != 0.0).count(), 1);
        assert_eq!(b[0], 50.0);
    }

    #[test]
    fn test_thermo_rows_encode_recurrence() {
        let n = 4;
        let mut ctx = context(n);
        ctx.set_water_draws(Some(arr1(&[0.0, 15.0, 0.0, 0.0]))).unwrap();
        let inputs = OptimizationInputs::new(
            Arc::new(config(true)),
            Arc::new(ctx),
            50.0,
            OptimizationMode::Cost,
        )
        .unwrap();
        let a = inputs.a_eq().unwrap();
        let b = inputs.b_eq().unwrap();

        let gain = 2500.0 * 900.0 / (150.0 * 4185.0);
        let rho = 15.0 / 150.0;

        // Step 1 row: T2 - (1-rho) T1 - K x1 = rho*cold - loss
        let row = 2;
        assert!((a[(row, 1)] + gain).abs() < 1e-12);
        assert!((a[(row, n + 1)] + (1.0 - rho)).abs() < 1e-12);
        assert_eq!(a[(row, n + 2)], 1.0);
        assert!((b[row] - (rho * 15.0 - 0.02 * 15.0)).abs() < 1e-12);
    }

    #[test]
    fn test_electrical_rows_encode_balance() {
        let n = 4;
        let mut ctx = context(n);
        ctx.set_solar_production(Some(arr1(&[0.0, 50.0, 0.0, 0.0]))).unwrap();
        let inputs = OptimizationInputs::new(
            Arc::new(config(true)),
            Arc::new(ctx),
            50.0,
            OptimizationMode::Cost,
        )
        .unwrap();
        let a = inputs.a_eq().unwrap();
        let b = inputs.b_eq().unwrap();

        let row = 1 + n + 1; // electrical row of step 1
        assert_eq!(a[(row, 1)], -2500.0);
        assert_eq!(a[(row, 2 * n + 1 + 1)], 1.0);
        assert_eq!(a[(row, 3 * n + 1 + 1)], -1.0);
        assert_eq!(b[row], 100.0 - 50.0);
    }

    #[test]
    fn test_bounds_layout() {
        let n = 4;
        let mut ctx = context(n);
        ctx.set_availability_on(Some(arr1(&[1.0, 0.0, 1.0, 1.0]))).unwrap();
        let inputs = OptimizationInputs::new(
            Arc::new(config(true)),
            Arc::new(ctx),
            50.0,
            OptimizationMode::Cost,
        )
        .unwrap();
        let bounds = inputs.bounds().unwrap();
        assert_eq!(bounds.len(), 17);
        // Availability caps x
        assert_eq!(bounds[1], (0.0, 0.0));
        assert_eq!(bounds[0], (0.0, 1.0));
        // T0 free down to zero, later temperatures floored by setpoints
        assert_eq!(bounds[n], (0.0, 95.0));
        assert_eq!(bounds[n + 1], (45.0, 95.0));
        // Flows unbounded above
        assert_eq!(bounds[2 * n + 1], (0.0, f64::INFINITY));
        assert_eq!(bounds[4 * n], (0.0, f64::INFINITY));
    }

    #[test]
    fn test_cost_objective_layout() {
        let inputs = inputs(4, true);
        let c = inputs.cost_objective().unwrap();
        assert_eq!(c.len(), 17);
        assert!(c.iter().take(9).all(|&v| v == 0.0));
        assert!((c[9] - 0.2).abs() < 1e-12);
        assert!((c[13] + 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_self_consumption_objective_penalties() {
        let inputs = inputs(4, true);
        let c = inputs.self_consumption_objective();
        assert_eq!(c[9], 1000.0);
        assert_eq!(c[13], 1.0);
        assert!(c.iter().take(9).all(|&v| v == 0.0));
    }

    #[test]
    fn test_integrality_follows_gradation() {
        let inputs = inputs(4, true);
        assert!(inputs.integrality().iter().all(|&flag| !flag));

        let inputs = inputs_with_gradation_off();
        let flags = inputs.integrality();
        assert!(flags.iter().take(4).all(|&flag| flag));
        assert!(flags.iter().skip(4).all(|&flag| !flag));
    }

    fn inputs_with_gradation_off() -> OptimizationInputs {
        OptimizationInputs::new(
            Arc::new(config(false)),
            Arc::new(context(4)),
            50.0,
            OptimizationMode::Cost,
        )
        .unwrap()
    }

    #[test]
    fn test_missing_context_field_is_named() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let ctx = ExternalContext::new(4, 15, start).unwrap();
        let inputs = OptimizationInputs::new(
            Arc::new(config(true)),
            Arc::new(ctx),
            50.0,
            OptimizationMode::Cost,
        )
        .unwrap();
        assert!(matches!(
            inputs.a_eq(),
            Err(OptimizerError::MissingData("water_draws"))
        ));
    }
}
