use thiserror::Error;

/// Error taxonomy of the optimization core.
///
/// Validation, mode and permission errors bubble synchronously to the caller
/// and never leave partially mutated state behind. Solver and weather errors
/// surface at the service boundary.
#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("mode mismatch: current tariff mode is '{actual}' but this field belongs to mode '{expected}'")]
    ModeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("dimension mismatch: expected length {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("not enough variables: '{0}' is missing")]
    MissingData(&'static str),

    #[error("no external context set")]
    ContextMissing,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("weather data invalid: {0}")]
    WeatherInvalid(String),

    #[error("solver failed: {0}")]
    SolverFailed(String),

    #[error("update required: {0}")]
    UpdateRequired(String),
}

impl OptimizerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_data_names_the_field() {
        let err = OptimizerError::MissingData("solar_production");
        assert!(err.to_string().contains("solar_production"));
        assert!(err.to_string().contains("not enough variables"));
    }

    #[test]
    fn test_dimension_message() {
        let err = OptimizerError::Dimension {
            expected: 17,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch: expected length 17, got 4"
        );
    }

    #[test]
    fn test_validation_helper() {
        let err = OptimizerError::validation("volume must be positive");
        assert!(matches!(err, OptimizerError::Validation(_)));
        assert_eq!(err.to_string(), "validation error: volume must be positive");
    }
}
