use std::fmt;

use crate::error::{OptimizerError, Result};

/// Objective pursued by the solver. Wire names are historical:
/// `cost` and `AutoCons`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationMode {
    Cost,
    SelfConsumption,
}

impl OptimizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::SelfConsumption => "AutoCons",
        }
    }
}

impl fmt::Display for OptimizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OptimizationMode {
    type Err = OptimizerError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cost" => Ok(Self::Cost),
            "AutoCons" => Ok(Self::SelfConsumption),
            other => Err(OptimizerError::validation(format!(
                "unknown optimization mode '{other}', expected 'cost' or 'AutoCons'"
            ))),
        }
    }
}

/// Per-client behaviour toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    /// Whether the element can modulate continuously in [0,1]; otherwise
    /// decisions are binary on/off.
    pub gradation: bool,
    pub mode: OptimizationMode,
}

impl Features {
    pub fn new(gradation: bool, mode: OptimizationMode) -> Self {
        Self { gradation, mode }
    }
}
