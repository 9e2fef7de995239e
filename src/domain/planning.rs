use chrono::{NaiveTime, Timelike};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{OptimizerError, Result};

const MINUTES_PER_DAY: u32 = 24 * 60;
const MINUTES_PER_WEEK: u32 = 7 * MINUTES_PER_DAY;

/// A weekly comfort requirement: at `(day, time)` the tank should hold
/// `temperature` degrees, with `drawn_volume` litres expected to be tapped.
///
/// Days follow ISO weekday numbering shifted to zero: 0 = Monday, 6 = Sunday.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setpoint {
    day: u8,
    time: NaiveTime,
    temperature: f64,
    drawn_volume: f64,
}

impl Setpoint {
    pub fn new(day: u8, time: NaiveTime, temperature: f64, drawn_volume: f64) -> Result<Self> {
        if day > 6 {
            return Err(OptimizerError::validation(format!(
                "setpoint day must be between 0 (Monday) and 6 (Sunday), got {day}"
            )));
        }
        if !(30.0..=99.0).contains(&temperature) {
            return Err(OptimizerError::validation(format!(
                "setpoint temperature must be between 30 and 99 degrees C, got {temperature}"
            )));
        }
        if !drawn_volume.is_finite() || drawn_volume < 0.0 {
            return Err(OptimizerError::validation(format!(
                "setpoint drawn volume must be non-negative, got {drawn_volume}"
            )));
        }
        Ok(Self {
            day,
            time,
            temperature,
            drawn_volume,
        })
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn drawn_volume(&self) -> f64 {
        self.drawn_volume
    }

    /// Position in minutes since Monday 00:00.
    pub fn week_minutes(&self) -> u32 {
        self.day as u32 * MINUTES_PER_DAY + self.time.hour() * 60 + self.time.minute()
    }
}

impl fmt::Display for Setpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        write!(
            f,
            "{} {} -> {:.1}C ({:.1}L)",
            DAYS[self.day as usize],
            self.time.format("%H:%M"),
            self.temperature,
            self.drawn_volume
        )
    }
}

/// Ordered weekly schedule of setpoints, unique by `(day, time)`.
///
/// When two entries share a key, the strictly hotter one wins; non-strict
/// ties keep the first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Planning {
    setpoints: Vec<Setpoint>,
}

impl Planning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_setpoints(raw: Vec<Setpoint>) -> Self {
        Self {
            setpoints: Self::clean_and_sort(raw),
        }
    }

    fn clean_and_sort(raw: Vec<Setpoint>) -> Vec<Setpoint> {
        let mut unique: BTreeMap<(u8, NaiveTime), Setpoint> = BTreeMap::new();
        for sp in raw {
            match unique.get(&(sp.day, sp.time)) {
                Some(existing) if sp.temperature <= existing.temperature => {}
                _ => {
                    unique.insert((sp.day, sp.time), sp);
                }
            }
        }
        unique.into_values().collect()
    }

    pub fn setpoints(&self) -> &[Setpoint] {
        &self.setpoints
    }

    pub fn set_setpoints(&mut self, raw: Vec<Setpoint>) {
        self.setpoints = Self::clean_and_sort(raw);
    }

    pub fn add(&mut self, setpoint: Setpoint) {
        let mut candidate = self.setpoints.clone();
        candidate.push(setpoint);
        self.setpoints = Self::clean_and_sort(candidate);
    }

    /// Removes the setpoint at `(day, time)`, reporting whether one existed.
    pub fn remove(&mut self, day: u8, time: NaiveTime) -> bool {
        let before = self.setpoints.len();
        self.setpoints
            .retain(|sp| !(sp.day == day && sp.time == time));
        self.setpoints.len() < before
    }

    pub fn clear(&mut self) {
        self.setpoints.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.setpoints.is_empty()
    }

    /// Setpoints falling in the forward window of `horizon_hours` starting at
    /// `(anchor_day, anchor_time)`, wrapping across the week boundary.
    ///
    /// Results are ordered by anchor-relative time: entries earlier in the
    /// natural week that only enter the window after the wrap sort last.
    /// Horizons beyond one week are not supported by this scan.
    pub fn future_setpoints(
        &self,
        anchor_day: u8,
        anchor_time: NaiveTime,
        horizon_hours: u32,
    ) -> Vec<Setpoint> {
        if self.setpoints.is_empty() {
            return Vec::new();
        }

        let t_anchor =
            anchor_day as u32 * MINUTES_PER_DAY + anchor_time.hour() * 60 + anchor_time.minute();
        let t_end = t_anchor + horizon_hours * 60;

        let mut selected: Vec<Setpoint> = self
            .setpoints
            .iter()
            .filter(|sp| {
                let t_sp = sp.week_minutes();
                (t_anchor <= t_sp && t_sp <= t_end) || (t_sp + MINUTES_PER_WEEK <= t_end)
            })
            .copied()
            .collect();

        selected.sort_by_key(|sp| {
            let t_sp = sp.week_minutes();
            if t_sp < t_anchor {
                t_sp + MINUTES_PER_WEEK
            } else {
                t_sp
            }
        });
        selected
    }
}
