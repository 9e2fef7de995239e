use ndarray::Array1;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::engine::context::ExternalContext;
use crate::engine::inputs::OptimizationInputs;
use crate::engine::system_config::SystemConfig;
use crate::error::{OptimizerError, Result};

/// Write-permission mode of a trajectory.
///
/// `Manual` accepts decision edits, `Solver` additionally accepts raw state
/// and cost uploads, `SolverDelivered` is the locked terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryMode {
    Manual,
    Solver,
    SolverDelivered,
}

/// Thermostat strategy of the standard (non-optimized) simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardHeaterMode {
    /// Heat whenever below the setpoint.
    Setpoint,
    /// Heat below the setpoint, but only while the off-peak signal is up.
    SetpointOffPeak,
}

/// Strategy of the PV-router simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterMode {
    /// Divert solar surplus only; the tank may run cold.
    SelfConsumptionOnly,
    /// Solar surplus during the day, full-power grid backup during off-peak.
    Comfort,
}

/// A complete control trajectory: the decision vector and its physical and
/// financial derivations.
///
/// The full vector `X` has length `4N+1`, laid out `[x | T | I | E]`. The
/// trajectory owns `X` and the cost / self-consumption caches; configuration
/// and context are shared read-only.
#[derive(Debug, Clone)]
pub struct TrajectorySystem {
    mode: TrajectoryMode,
    system_config: Option<Arc<SystemConfig>>,
    context: Option<Arc<ExternalContext>>,
    initial_temperature: Option<f64>,
    state: Option<Array1<f64>>,
    cost: Option<f64>,
    self_consumption: Option<f64>,
}

impl Default for TrajectorySystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TrajectorySystem {
    pub fn new() -> Self {
        Self {
            mode: TrajectoryMode::Manual,
            system_config: None,
            context: None,
            initial_temperature: None,
            state: None,
            cost: None,
            self_consumption: None,
        }
    }

    pub fn with_parts(
        system_config: Arc<SystemConfig>,
        context: Arc<ExternalContext>,
        initial_temperature: f64,
    ) -> Result<Self> {
        let mut trajectory = Self::new();
        trajectory.system_config = Some(system_config);
        trajectory.context = Some(context);
        trajectory.set_initial_temperature(Some(initial_temperature))?;
        Ok(trajectory)
    }

    /// An empty trajectory sharing the configuration and context of a run.
    pub fn from_inputs(inputs: &OptimizationInputs) -> Self {
        let mut trajectory = Self::new();
        trajectory.system_config = Some(Arc::clone(inputs.system_config()));
        trajectory.context = Some(Arc::clone(inputs.context()));
        trajectory.initial_temperature = Some(inputs.initial_temperature());
        trajectory
    }

    pub fn mode(&self) -> TrajectoryMode {
        self.mode
    }

    pub fn make_solver(&mut self) {
        debug!("trajectory entering solver mode");
        self.mode = TrajectoryMode::Solver;
    }

    pub fn make_solver_delivered(&mut self) {
        debug!("trajectory delivered and locked");
        self.mode = TrajectoryMode::SolverDelivered;
    }

    pub fn system_config(&self) -> Option<&Arc<SystemConfig>> {
        self.system_config.as_ref()
    }

    pub fn set_system_config(&mut self, config: Option<Arc<SystemConfig>>) {
        self.system_config = config;
    }

    pub fn context(&self) -> Option<&Arc<ExternalContext>> {
        self.context.as_ref()
    }

    pub fn set_context(&mut self, context: Option<Arc<ExternalContext>>) {
        self.context = context;
    }

    pub fn initial_temperature(&self) -> Option<f64> {
        self.initial_temperature
    }

    pub fn set_initial_temperature(&mut self, value: Option<f64>) -> Result<()> {
        if let Some(t) = value {
            if !t.is_finite() || !(0.0..=100.0).contains(&t) {
                return Err(OptimizerError::validation(format!(
                    "initial temperature must be between 0 and 100 degrees C, got {t}"
                )));
            }
        }
        self.initial_temperature = value;
        Ok(())
    }

    // -- X vector accessors --------------------------------------------------

    /// The full `[x | T | I | E]` vector, when set.
    pub fn state_vector(&self) -> Option<&Array1<f64>> {
        self.state.as_ref()
    }

    fn horizon_len(&self) -> Option<usize> {
        self.state.as_ref().map(|x| (x.len() - 1) / 4)
    }

    /// Decision segment `x[0..N)`.
    pub fn decisions(&self) -> Option<Array1<f64>> {
        let n = self.horizon_len()?;
        Some(self.state.as_ref()?.slice(ndarray::s![0..n]).to_owned())
    }

    /// Temperature segment `T[0..N]` (N+1 values).
    pub fn temperatures(&self) -> Option<Array1<f64>> {
        let n = self.horizon_len()?;
        Some(self.state.as_ref()?.slice(ndarray::s![n..2 * n + 1]).to_owned())
    }

    /// Grid import segment `I[0..N)`, watts.
    pub fn imports(&self) -> Option<Array1<f64>> {
        let n = self.horizon_len()?;
        Some(
            self.state
                .as_ref()?
                .slice(ndarray::s![2 * n + 1..3 * n + 1])
                .to_owned(),
        )
    }

    /// Grid export segment `E[0..N)`, watts.
    pub fn exports(&self) -> Option<Array1<f64>> {
        let n = self.horizon_len()?;
        Some(
            self.state
                .as_ref()?
                .slice(ndarray::s![3 * n + 1..4 * n + 1])
                .to_owned(),
        )
    }

    fn clear_caches(&mut self) {
        self.cost = None;
        self.self_consumption = None;
    }

    // -- Mutations -----------------------------------------------------------

    /// Replaces the decision segment.
    ///
    /// Requires a context and configuration; rejects wrong lengths, values
    /// outside `[0,1]` and, without gradation, non-binary values. On success
    /// the derived segments are reset to NaN, the caches are cleared and an
    /// update-required warning is emitted: call
    /// [`update_state`](Self::update_state) before reading derived vectors.
    pub fn set_decisions(&mut self, decisions: &Array1<f64>) -> Result<()> {
        if self.mode == TrajectoryMode::SolverDelivered {
            return Err(OptimizerError::PermissionDenied(
                "a delivered trajectory no longer accepts decision edits".into(),
            ));
        }
        let context = self.context.as_ref().ok_or(OptimizerError::ContextMissing)?;
        let config = self
            .system_config
            .as_ref()
            .ok_or(OptimizerError::MissingData("system_config"))?;

        let n = context.n();
        if decisions.len() != n {
            return Err(OptimizerError::Dimension {
                expected: n,
                actual: decisions.len(),
            });
        }
        if decisions.iter().any(|&v| !(0.0..=1.0).contains(&v)) {
            return Err(OptimizerError::validation(
                "decision values must stay within [0, 1]",
            ));
        }
        if !config.gradation && decisions.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(OptimizerError::validation(
                "without gradation, decision values must be exactly 0 or 1",
            ));
        }

        let mut state = Array1::from_elem(4 * n + 1, f64::NAN);
        state.slice_mut(ndarray::s![0..n]).assign(decisions);
        self.state = Some(state);
        self.clear_caches();
        warn!("decision vector updated; derived vectors are stale until update_state() runs");
        Ok(())
    }

    /// Drops the whole state vector and caches.
    pub fn clear_decisions(&mut self) -> Result<()> {
        if self.mode == TrajectoryMode::SolverDelivered {
            return Err(OptimizerError::PermissionDenied(
                "a delivered trajectory no longer accepts decision edits".into(),
            ));
        }
        self.state = None;
        self.clear_caches();
        Ok(())
    }

    /// Injects a fully computed `4N+1` vector. Solver mode only.
    pub fn upload_state(&mut self, state: Array1<f64>) -> Result<()> {
        if self.mode != TrajectoryMode::Solver {
            return Err(OptimizerError::PermissionDenied(
                "only the solver may upload the full state vector".into(),
            ));
        }
        let context = self.context.as_ref().ok_or(OptimizerError::ContextMissing)?;
        let expected = 4 * context.n() + 1;
        if state.len() != expected {
            return Err(OptimizerError::Dimension {
                expected,
                actual: state.len(),
            });
        }
        self.state = Some(state);
        self.clear_caches();
        Ok(())
    }

    /// Caches a solver-computed cost without recomputation. Solver mode only.
    pub fn upload_cost(&mut self, cost: f64) -> Result<()> {
        if self.mode != TrajectoryMode::Solver {
            return Err(OptimizerError::PermissionDenied(
                "only the solver may upload a cost".into(),
            ));
        }
        if !cost.is_finite() {
            return Err(OptimizerError::validation(format!(
                "uploaded cost must be finite, got {cost}"
            )));
        }
        self.cost = Some(cost);
        Ok(())
    }

    /// Recomputes temperatures, imports and exports from the decisions.
    ///
    /// The electrical balance is pure per-step; the thermal recurrence is
    /// causal and runs sequentially. Allowed in every mode.
    pub fn update_state(&mut self) -> Result<()> {
        let state = self.state.as_ref().ok_or(OptimizerError::MissingData("x"))?;
        let context = self.context.as_ref().ok_or(OptimizerError::ContextMissing)?;
        let config = self
            .system_config
            .as_ref()
            .ok_or(OptimizerError::MissingData("system_config"))?;
        let t_initial = self
            .initial_temperature
            .ok_or(OptimizerError::MissingData("initial_temperature"))?;

        let n = context.n();
        let decisions = state.slice(ndarray::s![0..n]).to_owned();

        let house = context.require_house_consumption()?;
        let solar = context.require_solar_production()?;
        let draws = context.require_water_draws()?;

        // Electrical balance, vectorized
        let heater_power = &decisions * config.power;
        let p_net = house - solar + &heater_power;
        let imports = p_net.mapv(|v| v.max(0.0));
        let exports = p_net.mapv(|v| (-v).max(0.0));

        // Thermal recurrence, causal
        let gain = config.gain_per_step(context.step_minutes());
        let loss = config.loss_per_step(context.step_minutes());
        let cold = config.cold_water_temperature;

        let mut temperatures = Array1::zeros(n + 1);
        temperatures[0] = t_initial;
        for i in 0..n {
            let rho = draws[i] / config.volume;
            let next =
                temperatures[i] * (1.0 - rho) + rho * cold + gain * decisions[i] - loss;
            // The tank cannot end up colder than the inlet water
            temperatures[i + 1] = next.max(cold);
        }

        let mut full = Array1::zeros(4 * n + 1);
        full.slice_mut(ndarray::s![0..n]).assign(&decisions);
        full.slice_mut(ndarray::s![n..2 * n + 1]).assign(&temperatures);
        full.slice_mut(ndarray::s![2 * n + 1..3 * n + 1]).assign(&imports);
        full.slice_mut(ndarray::s![3 * n + 1..4 * n + 1]).assign(&exports);
        self.state = Some(full);
        self.clear_caches();
        Ok(())
    }

    // -- KPIs ----------------------------------------------------------------

    /// Monetary cost of the trajectory over the horizon, in currency units.
    ///
    /// Cached; the cache is cleared by any mutation of X.
    pub fn compute_cost(&mut self) -> Result<f64> {
        if let Some(cost) = self.cost {
            return Ok(cost);
        }
        let context = self.context.as_ref().ok_or(OptimizerError::ContextMissing)?;
        let purchase = context.require_prices_purchase()?;
        let sell = context.require_prices_sell()?;

        let imports = self.imports().ok_or(OptimizerError::MissingData("x"))?;
        let exports = self.exports().ok_or(OptimizerError::MissingData("x"))?;
        if imports.iter().chain(exports.iter()).any(|v| v.is_nan()) {
            return Err(OptimizerError::UpdateRequired(
                "derived flows contain NaN; run update_state() before computing the cost".into(),
            ));
        }

        // Powers (W) priced per kWh: scale by step hours and the kilo factor
        let dt_hours = context.step_minutes() as f64 / 60.0;
        let cost = dt_hours * (imports.dot(purchase) - exports.dot(sell)) / 1000.0;
        self.cost = Some(cost);
        Ok(cost)
    }

    /// Share of solar production consumed on site, in `[0, 1]`.
    ///
    /// Exports are counted as solar-origin only. Returns 0 when there is no
    /// production at all over the horizon.
    pub fn compute_self_consumption(&mut self) -> Result<f64> {
        if let Some(ratio) = self.self_consumption {
            return Ok(ratio);
        }
        let context = self.context.as_ref().ok_or(OptimizerError::ContextMissing)?;
        let solar = context.require_solar_production()?;
        let exports = self.exports().ok_or(OptimizerError::MissingData("x"))?;
        if exports.iter().any(|v| v.is_nan()) {
            return Err(OptimizerError::UpdateRequired(
                "exports contain NaN; run update_state() before computing self-consumption".into(),
            ));
        }
        if solar.iter().any(|v| v.is_nan()) {
            return Err(OptimizerError::UpdateRequired(
                "solar production contains NaN; supply a materialized vector before computing self-consumption".into(),
            ));
        }

        let total_production: f64 = solar.sum();
        let ratio = if total_production == 0.0 {
            0.0
        } else {
            (total_production - exports.sum()) / total_production
        };
        self.self_consumption = Some(ratio);
        Ok(ratio)
    }

    // -- Simulators ----------------------------------------------------------

    /// Simulates a plain thermostat-driven heater, without optimization.
    ///
    /// At each step the element runs flat out when the tank is below the
    /// setpoint and, in off-peak mode, the grid signal allows it. The
    /// returned trajectory carries fully derived vectors.
    pub fn generate_standard_trajectory(
        context: Arc<ExternalContext>,
        system_config: Arc<SystemConfig>,
        initial_temperature: f64,
        mode: StandardHeaterMode,
        setpoint_temperature: Option<f64>,
    ) -> Result<Self> {
        let setpoint = match setpoint_temperature {
            Some(t) => t,
            // Fall back to the most demanding comfort requirement on record
            None => context
                .future_setpoints()
                .ok_or(OptimizerError::MissingData("future_setpoints"))?
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max),
        };

        let n = context.n();
        let draws = context.require_water_draws()?;
        let off_peak = match context.off_peak_hours() {
            Some(mask) => mask.clone(),
            // No tariff signal recorded: the grid is always available
            None => Array1::ones(n),
        };

        let gain = system_config.gain_per_step(context.step_minutes());
        let loss = system_config.loss_per_step(context.step_minutes());
        let cold = system_config.cold_water_temperature;

        let mut decisions = Array1::zeros(n);
        let mut temperatures = Array1::zeros(n + 1);
        temperatures[0] = initial_temperature;
        let mut current = initial_temperature;

        for i in 0..n {
            let need_heating = current < setpoint;
            let allowed = match mode {
                StandardHeaterMode::Setpoint => true,
                StandardHeaterMode::SetpointOffPeak => off_peak[i] == 1.0,
            };
            decisions[i] = if need_heating && allowed { 1.0 } else { 0.0 };

            let rho = draws[i] / system_config.volume;
            let next = current * (1.0 - rho) + rho * cold + gain * decisions[i] - loss;
            current = next.max(cold);
            temperatures[i + 1] = current;
        }

        Self::assemble_simulated(
            system_config,
            context,
            initial_temperature,
            decisions,
            temperatures,
        )
    }

    /// Simulates a PV router diverting solar surplus into the tank.
    ///
    /// Below the setpoint the router modulates with the measured surplus; in
    /// comfort mode it additionally forces full power during off-peak hours.
    /// At or above the setpoint everything is cut, surplus included.
    pub fn generate_router_only_trajectory(
        context: Arc<ExternalContext>,
        system_config: Arc<SystemConfig>,
        initial_temperature: f64,
        mode: RouterMode,
        setpoint_temperature: Option<f64>,
    ) -> Result<Self> {
        let setpoint = setpoint_temperature.unwrap_or(system_config.t_max_safe);

        let n = context.n();
        let draws = context.require_water_draws()?;
        let solar = context.require_solar_production()?;
        let house = context.require_house_consumption()?;
        let off_peak = match context.off_peak_hours() {
            Some(mask) => mask.clone(),
            None => Array1::ones(n),
        };

        let gain = system_config.gain_per_step(context.step_minutes());
        let loss = system_config.loss_per_step(context.step_minutes());
        let cold = system_config.cold_water_temperature;

        let mut decisions = Array1::zeros(n);
        let mut temperatures = Array1::zeros(n + 1);
        temperatures[0] = initial_temperature;
        let mut current = initial_temperature;

        for i in 0..n {
            let decision = if current >= setpoint {
                0.0
            } else {
                let surplus = solar[i] - house[i];
                let x_solar = (surplus.max(0.0) / system_config.power).clamp(0.0, 1.0);
                let x_backup = match mode {
                    RouterMode::Comfort if off_peak[i] == 1.0 => 1.0,
                    _ => 0.0,
                };
                x_solar.max(x_backup)
            };
            decisions[i] = decision;

            let rho = draws[i] / system_config.volume;
            let next = current * (1.0 - rho) + rho * cold + gain * decision - loss;
            current = next.max(cold);
            temperatures[i + 1] = current;
        }

        Self::assemble_simulated(
            system_config,
            context,
            initial_temperature,
            decisions,
            temperatures,
        )
    }

    /// Packs simulated decisions and temperatures with their electrical
    /// balance into a manual-mode trajectory.
    fn assemble_simulated(
        system_config: Arc<SystemConfig>,
        context: Arc<ExternalContext>,
        initial_temperature: f64,
        decisions: Array1<f64>,
        temperatures: Array1<f64>,
    ) -> Result<Self> {
        let n = context.n();
        let house = context.require_house_consumption()?;
        let solar = context.require_solar_production()?;

        let heater_power = &decisions * system_config.power;
        let p_net = house - solar + &heater_power;
        let imports = p_net.mapv(|v| v.max(0.0));
        let exports = p_net.mapv(|v| (-v).max(0.0));

        let mut full = Array1::zeros(4 * n + 1);
        full.slice_mut(ndarray::s![0..n]).assign(&decisions);
        full.slice_mut(ndarray::s![n..2 * n + 1]).assign(&temperatures);
        full.slice_mut(ndarray::s![2 * n + 1..3 * n + 1]).assign(&imports);
        full.slice_mut(ndarray::s![3 * n + 1..4 * n + 1]).assign(&exports);

        let mut trajectory =
            Self::with_parts(system_config, context, initial_temperature)?;
        trajectory.state = Some(full);
        Ok(trajectory)
    }
}
