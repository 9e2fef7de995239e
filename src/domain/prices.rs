use chrono::NaiveTime;
use itertools::Itertools;
use std::fmt;

use crate::domain::time_slot::TimeSlot;
use crate::error::{OptimizerError, Result};

const MINUTES_24H: u32 = 24 * 60;

/// Tariff scheme selection. Wire names follow the historical contract:
/// `BASE` for the flat tariff, `HPHC` for peak/off-peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TariffMode {
    Base,
    PeakOffPeak,
}

impl TariffMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "BASE",
            Self::PeakOffPeak => "HPHC",
        }
    }
}

impl fmt::Display for TariffMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TariffMode {
    type Err = OptimizerError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BASE" => Ok(Self::Base),
            "HPHC" => Ok(Self::PeakOffPeak),
            other => Err(OptimizerError::validation(format!(
                "unknown tariff mode '{other}', expected 'BASE' or 'HPHC'"
            ))),
        }
    }
}

/// Electricity tariff of a client.
///
/// Fields tied to a tariff mode are only reachable in that mode; reading or
/// writing them in the other mode is a contract violation surfaced as a
/// mode-mismatch error. The resale price applies in both modes.
#[derive(Debug, Clone, PartialEq)]
pub struct Prices {
    mode: TariffMode,
    base: f64,
    peak: f64,
    offpeak: f64,
    resale: f64,
    peak_slots: Vec<TimeSlot>,
}

impl Prices {
    pub fn new(mode: TariffMode) -> Self {
        Self {
            mode,
            base: 0.20,
            peak: 0.22,
            offpeak: 0.18,
            resale: 0.10,
            peak_slots: Vec::new(),
        }
    }

    fn check_mode(&self, expected: TariffMode) -> Result<()> {
        if self.mode != expected {
            return Err(OptimizerError::ModeMismatch {
                expected: expected.as_str(),
                actual: self.mode.as_str(),
            });
        }
        Ok(())
    }

    fn check_price(value: f64, label: &str) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(OptimizerError::validation(format!(
                "{label} price must be a non-negative number, got {value}"
            )));
        }
        Ok(())
    }

    pub fn mode(&self) -> TariffMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TariffMode) {
        self.mode = mode;
    }

    pub fn base(&self) -> Result<f64> {
        self.check_mode(TariffMode::Base)?;
        Ok(self.base)
    }

    pub fn set_base(&mut self, value: f64) -> Result<()> {
        self.check_mode(TariffMode::Base)?;
        Self::check_price(value, "base")?;
        self.base = value;
        Ok(())
    }

    pub fn peak(&self) -> Result<f64> {
        self.check_mode(TariffMode::PeakOffPeak)?;
        Ok(self.peak)
    }

    pub fn set_peak(&mut self, value: f64) -> Result<()> {
        self.check_mode(TariffMode::PeakOffPeak)?;
        Self::check_price(value, "peak")?;
        self.peak = value;
        Ok(())
    }

    pub fn offpeak(&self) -> Result<f64> {
        self.check_mode(TariffMode::PeakOffPeak)?;
        Ok(self.offpeak)
    }

    pub fn set_offpeak(&mut self, value: f64) -> Result<()> {
        self.check_mode(TariffMode::PeakOffPeak)?;
        Self::check_price(value, "off-peak")?;
        self.offpeak = value;
        Ok(())
    }

    pub fn resale(&self) -> f64 {
        self.resale
    }

    pub fn set_resale(&mut self, value: f64) -> Result<()> {
        Self::check_price(value, "resale")?;
        self.resale = value;
        Ok(())
    }

    pub fn peak_slots(&self) -> Result<&[TimeSlot]> {
        self.check_mode(TariffMode::PeakOffPeak)?;
        Ok(&self.peak_slots)
    }

    /// Replaces the peak intervals. Slots must be strictly ordered (an
    /// interval ends no later than the next one starts) and their total
    /// duration must lie strictly inside (0, 24h) so that both bands exist.
    pub fn set_peak_slots(&mut self, slots: Vec<TimeSlot>) -> Result<()> {
        self.check_mode(TariffMode::PeakOffPeak)?;

        let mut sorted = slots;
        sorted.sort();

        for (current, next) in sorted.iter().tuple_windows() {
            if current.overlaps(next) {
                return Err(OptimizerError::validation(format!(
                    "peak slots {current} and {next} overlap"
                )));
            }
            if current.end() > next.start() {
                return Err(OptimizerError::validation(format!(
                    "peak slots {current} and {next} are out of order"
                )));
            }
        }

        let total: u32 = sorted.iter().map(TimeSlot::duration_minutes).sum();
        if total >= MINUTES_24H {
            return Err(OptimizerError::validation(
                "peak hours cannot cover the full day; some off-peak time must remain",
            ));
        }
        if total == 0 {
            return Err(OptimizerError::validation(
                "peak hours cannot be empty in peak/off-peak mode",
            ));
        }

        self.peak_slots = sorted;
        Ok(())
    }

    /// Purchase price applicable at a given time of day.
    ///
    /// Linear scan over the peak slots; the list is small by construction.
    pub fn current_purchase_price(&self, moment: NaiveTime) -> f64 {
        match self.mode {
            TariffMode::Base => self.base,
            TariffMode::PeakOffPeak => {
                if self.peak_slots.iter().any(|slot| slot.contains(moment)) {
                    self.peak
                } else {
                    self.offpeak
                }
            }
        }
    }
}

impl Default for Prices {
    fn default() -> Self {
        Self::new(TariffMode::Base)
    }
}
