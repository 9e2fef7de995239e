use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use ndarray::Array2;

use crate::error::{OptimizerError, Result};

/// Default background load assumed when no profile matrix is supplied, in watts.
const BACKGROUND_LOAD_W: f64 = 300.0;

/// Weekly baseline household consumption, one value per (weekday, hour).
///
/// Rows are days (0 = Monday), columns are hours. Values are watts.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionProfile {
    data: Array2<f64>,
    background: f64,
}

impl ConsumptionProfile {
    pub const HOURS_PER_DAY: usize = 24;
    pub const DAYS_PER_WEEK: usize = 7;

    /// A flat profile at the default background load.
    pub fn flat() -> Self {
        Self {
            data: Array2::from_elem(
                (Self::DAYS_PER_WEEK, Self::HOURS_PER_DAY),
                BACKGROUND_LOAD_W,
            ),
            background: BACKGROUND_LOAD_W,
        }
    }

    pub fn from_matrix(data: Array2<f64>) -> Result<Self> {
        Self::check_matrix(&data)?;
        Ok(Self {
            data,
            background: BACKGROUND_LOAD_W,
        })
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.len() != Self::DAYS_PER_WEEK {
            return Err(OptimizerError::Dimension {
                expected: Self::DAYS_PER_WEEK,
                actual: rows.len(),
            });
        }
        let mut data = Array2::zeros((Self::DAYS_PER_WEEK, Self::HOURS_PER_DAY));
        for (day, row) in rows.iter().enumerate() {
            if row.len() != Self::HOURS_PER_DAY {
                return Err(OptimizerError::Dimension {
                    expected: Self::HOURS_PER_DAY,
                    actual: row.len(),
                });
            }
            for (hour, &value) in row.iter().enumerate() {
                data[(day, hour)] = value;
            }
        }
        Self::from_matrix(data)
    }

    fn check_matrix(data: &Array2<f64>) -> Result<()> {
        if data.dim() != (Self::DAYS_PER_WEEK, Self::HOURS_PER_DAY) {
            return Err(OptimizerError::validation(format!(
                "consumption profile must be a {}x{} matrix, got {}x{}",
                Self::DAYS_PER_WEEK,
                Self::HOURS_PER_DAY,
                data.dim().0,
                data.dim().1
            )));
        }
        if data.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(OptimizerError::validation(
                "consumption profile values must be finite and non-negative",
            ));
        }
        Ok(())
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Background load assumed outside any configured profile, watts.
    pub fn background(&self) -> f64 {
        self.background
    }

    pub fn set_data(&mut self, data: Array2<f64>) -> Result<()> {
        Self::check_matrix(&data)?;
        self.data = data;
        Ok(())
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data
            .outer_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }

    /// Samples the weekly profile on the horizon grid.
    ///
    /// For each step the value is linearly interpolated between the two
    /// bracketing hour cells so the baseline does not step-jump at hour
    /// boundaries; an hour rollover at 23h reads the first hour of the next
    /// weekday (modulo the week).
    pub fn vector(&self, start: NaiveDateTime, n: usize, step_minutes: u32) -> Vec<f64> {
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let instant = start + Duration::minutes((i as i64) * step_minutes as i64);
            let day = instant.weekday().num_days_from_monday() as usize;
            let hour_float = instant.hour() as f64 + instant.minute() as f64 / 60.0;

            let h1 = hour_float.floor() as usize;
            let h2 = (h1 + 1) % Self::HOURS_PER_DAY;
            let day2 = if h2 > h1 {
                day
            } else {
                (day + 1) % Self::DAYS_PER_WEEK
            };

            let v1 = self.data[(day, h1)];
            let v2 = self.data[(day2, h2)];
            let fraction = hour_float - h1 as f64;
            out.push(v1 + fraction * (v2 - v1));
        }
        out
    }
}

impl Default for ConsumptionProfile {
    fn default() -> Self {
        Self::flat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn monday(h: u32, m: u32) -> NaiveDateTime {
        // 2024-01-01 is a Monday
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_flat_profile_vector_is_constant() {
        let profile = ConsumptionProfile::flat();
        let vector = profile.vector(monday(10, 0), 8, 15);
        assert_eq!(vector.len(), 8);
        assert!(vector.iter().all(|&v| (v - BACKGROUND_LOAD_W).abs() < 1e-9));
    }

    #[test]
    fn test_all_zero_matrix_gives_zero_vector() {
        let profile = ConsumptionProfile::from_matrix(Array2::zeros((7, 24))).unwrap();
        let vector = profile.vector(monday(0, 0), 96, 15);
        assert!(vector.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_interpolation_between_hours() {
        let mut data = Array2::zeros((7, 24));
        data[(0, 10)] = 100.0;
        data[(0, 11)] = 200.0;
        let profile = ConsumptionProfile::from_matrix(data).unwrap();

        let vector = profile.vector(monday(10, 0), 3, 30);
        assert!((vector[0] - 100.0).abs() < 1e-9);
        assert!((vector[1] - 150.0).abs() < 1e-9); // 10:30 halfway
        assert!((vector[2] - 200.0).abs() < 1e-9); // 11:00
    }

    #[test]
    fn test_day_rollover_interpolates_into_next_day() {
        let mut data = Array2::zeros((7, 24));
        data[(0, 23)] = 100.0;
        data[(1, 0)] = 300.0;
        let profile = ConsumptionProfile::from_matrix(data).unwrap();

        let vector = profile.vector(monday(23, 30), 1, 15);
        assert!((vector[0] - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_wrong_shape_and_negative_values() {
        assert!(ConsumptionProfile::from_matrix(Array2::zeros((7, 23))).is_err());
        let mut data = Array2::zeros((7, 24));
        data[(0, 0)] = -1.0;
        assert!(ConsumptionProfile::from_matrix(data).is_err());
    }

    #[test]
    fn test_rows_round_trip() {
        let mut data = Array2::zeros((7, 24));
        data[(2, 5)] = 42.0;
        let profile = ConsumptionProfile::from_matrix(data).unwrap();
        let rebuilt = ConsumptionProfile::from_rows(&profile.to_rows()).unwrap();
        assert_eq!(profile, rebuilt);
    }
}
