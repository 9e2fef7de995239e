pub mod context;
pub mod forecast;
pub mod inputs;
pub mod service;
pub mod solver;
pub mod system_config;
pub mod trajectory;

pub use context::ExternalContext;
pub use forecast::{ForecastPoint, ForecastSeries};
pub use inputs::OptimizationInputs;
pub use service::OptimizerService;
pub use solver::Solver;
pub use system_config::SystemConfig;
pub use trajectory::{RouterMode, StandardHeaterMode, TrajectoryMode, TrajectorySystem};
