use chrono::{Duration, NaiveDateTime};
use ndarray::Array1;

use crate::error::{OptimizerError, Result};

/// One solar production sample: a timezone-naive instant and a power in watts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub timestamp: NaiveDateTime,
    pub power_w: f64,
}

/// Time-indexed solar production forecast supplied by the caller.
///
/// Samples are kept sorted by timestamp. The series is validated for
/// coverage and sampling density before being resampled onto the horizon
/// grid by linear time interpolation, with edge values extended outward.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    points: Vec<ForecastPoint>,
}

impl ForecastSeries {
    pub fn new(mut points: Vec<ForecastPoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(OptimizerError::WeatherInvalid(
                "the production forecast is empty".into(),
            ));
        }
        if points.iter().any(|p| !p.power_w.is_finite()) {
            return Err(OptimizerError::WeatherInvalid(
                "the production forecast contains NaN or infinite values".into(),
            ));
        }
        points.sort_by_key(|p| p.timestamp);
        if points.windows(2).any(|w| w[0].timestamp == w[1].timestamp) {
            return Err(OptimizerError::WeatherInvalid(
                "the production forecast contains duplicate timestamps".into(),
            ));
        }
        Ok(Self { points })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (NaiveDateTime, f64)>) -> Result<Self> {
        Self::new(
            pairs
                .into_iter()
                .map(|(timestamp, power_w)| ForecastPoint { timestamp, power_w })
                .collect(),
        )
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Checks that the series spans `[start, end]` and that no two
    /// consecutive samples are further apart than `max_gap_minutes`.
    pub fn validate_coverage(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        max_gap_minutes: u32,
    ) -> Result<()> {
        let first = self.points.first().expect("series is never empty").timestamp;
        let last = self.points.last().expect("series is never empty").timestamp;
        if first > start || last < end {
            return Err(OptimizerError::WeatherInvalid(format!(
                "forecast covers [{first} .. {last}] but [{start} .. {end}] is required"
            )));
        }

        let max_gap = Duration::minutes(max_gap_minutes as i64);
        for pair in self.points.windows(2) {
            let gap = pair[1].timestamp - pair[0].timestamp;
            if gap > max_gap {
                return Err(OptimizerError::WeatherInvalid(format!(
                    "forecast has a {} min hole around {}, limit is {max_gap_minutes} min",
                    gap.num_minutes(),
                    pair[0].timestamp
                )));
            }
        }
        Ok(())
    }

    /// Samples the series on the horizon grid by linear time interpolation.
    ///
    /// Grid points before the first sample take its value, points after the
    /// last sample take that one (the back/forward fill of the edges).
    pub fn resample(&self, start: NaiveDateTime, n: usize, step_minutes: u32) -> Array1<f64> {
        let mut out = Array1::zeros(n);
        for i in 0..n {
            let target = start + Duration::minutes(i as i64 * step_minutes as i64);
            out[i] = self.value_at(target);
        }
        out
    }

    fn value_at(&self, target: NaiveDateTime) -> f64 {
        let points = &self.points;
        if target <= points[0].timestamp {
            return points[0].power_w;
        }
        if target >= points[points.len() - 1].timestamp {
            return points[points.len() - 1].power_w;
        }
        // partition_point: first sample at or after the target
        let right = points.partition_point(|p| p.timestamp < target);
        let after = &points[right];
        if after.timestamp == target {
            return after.power_w;
        }
        let before = &points[right - 1];
        let span = (after.timestamp - before.timestamp).num_seconds() as f64;
        let offset = (target - before.timestamp).num_seconds() as f64;
        before.power_w + (after.power_w - before.power_w) * offset / span
    }
}
