use chrono::NaiveTime;
use itertools::Itertools;

use crate::domain::consumption::ConsumptionProfile;
use crate::domain::time_slot::TimeSlot;
use crate::error::{OptimizerError, Result};

const MINUTES_24H: u32 = 24 * 60;

/// Operating restrictions for the heater: forbidden daily slots, a minimum
/// tank temperature and the baseline consumption profile of the household.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraints {
    consumption_profile: ConsumptionProfile,
    forbidden_slots: Vec<TimeSlot>,
    minimum_temperature: f64,
}

impl Constraints {
    pub fn new(
        consumption_profile: ConsumptionProfile,
        forbidden_slots: Vec<TimeSlot>,
        minimum_temperature: f64,
    ) -> Result<Self> {
        Self::check_minimum_temperature(minimum_temperature)?;
        let mut sorted = forbidden_slots;
        Self::check_coherence(&mut sorted)?;
        Ok(Self {
            consumption_profile,
            forbidden_slots: sorted,
            minimum_temperature,
        })
    }

    fn check_minimum_temperature(value: f64) -> Result<()> {
        if !value.is_finite() || !(0.0..=95.0).contains(&value) {
            return Err(OptimizerError::validation(format!(
                "minimum temperature must be between 0 and 95 degrees C, got {value}"
            )));
        }
        Ok(())
    }

    /// Sorts the list in place and checks the forbidden-slot rules:
    /// pairwise non-overlapping, total coverage strictly below 24h.
    fn check_coherence(slots: &mut [TimeSlot]) -> Result<()> {
        if slots.is_empty() {
            return Ok(());
        }
        slots.sort();

        for (current, next) in slots.iter().tuple_windows() {
            if current.overlaps(next) {
                return Err(OptimizerError::validation(format!(
                    "forbidden slots {current} and {next} overlap"
                )));
            }
        }

        let total: u32 = slots.iter().map(TimeSlot::duration_minutes).sum();
        if total >= MINUTES_24H {
            return Err(OptimizerError::validation(
                "forbidden slots cover the whole day; the heater must stay reachable",
            ));
        }
        Ok(())
    }

    pub fn consumption_profile(&self) -> &ConsumptionProfile {
        &self.consumption_profile
    }

    pub fn set_consumption_profile(&mut self, profile: ConsumptionProfile) {
        self.consumption_profile = profile;
    }

    pub fn forbidden_slots(&self) -> &[TimeSlot] {
        &self.forbidden_slots
    }

    /// Replaces the forbidden slots. On validation failure the previous list
    /// is left intact.
    pub fn set_forbidden_slots(&mut self, slots: Vec<TimeSlot>) -> Result<()> {
        let mut candidate = slots;
        Self::check_coherence(&mut candidate)?;
        self.forbidden_slots = candidate;
        Ok(())
    }

    /// Test-then-insert: validates the slot against the whole list before
    /// committing it.
    pub fn add_forbidden(&mut self, start: NaiveTime, end: NaiveTime) -> Result<()> {
        let slot = TimeSlot::new(start, end)?;
        let mut candidate = self.forbidden_slots.clone();
        candidate.push(slot);
        Self::check_coherence(&mut candidate)?;
        self.forbidden_slots = candidate;
        Ok(())
    }

    pub fn minimum_temperature(&self) -> f64 {
        self.minimum_temperature
    }

    pub fn set_minimum_temperature(&mut self, value: f64) -> Result<()> {
        Self::check_minimum_temperature(value)?;
        self.minimum_temperature = value;
        Ok(())
    }

    /// True unless some forbidden slot contains the given moment.
    pub fn is_allowed(&self, moment: NaiveTime) -> bool {
        !self.forbidden_slots.iter().any(|slot| slot.contains(moment))
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            consumption_profile: ConsumptionProfile::flat(),
            forbidden_slots: Vec::new(),
            minimum_temperature: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(sh: u32, sm: u32, eh: u32, em: u32) -> TimeSlot {
        TimeSlot::new(t(sh, sm), t(eh, em)).unwrap()
    }

    #[test]
    fn test_empty_forbidden_means_always_allowed() {
        let constraints = Constraints::default();
        assert!(constraints.is_allowed(t(0, 0)));
        assert!(constraints.is_allowed(t(12, 0)));
        assert!(constraints.is_allowed(t(23, 59)));
    }

    #[test]
    fn test_is_allowed_respects_slots() {
        let mut constraints = Constraints::default();
        constraints
            .set_forbidden_slots(vec![slot(8, 0, 12, 0)])
            .unwrap();
        assert!(!constraints.is_allowed(t(8, 0)));
        assert!(!constraints.is_allowed(t(11, 59)));
        assert!(constraints.is_allowed(t(12, 0)));
        assert!(constraints.is_allowed(t(7, 59)));
    }

    #[test]
    fn test_overlapping_slots_rejected_state_intact() {
        let mut constraints = Constraints::default();
        constraints
            .set_forbidden_slots(vec![slot(6, 0, 8, 0)])
            .unwrap();

        let err = constraints.set_forbidden_slots(vec![slot(6, 0, 9, 0), slot(8, 0, 10, 0)]);
        assert!(err.is_ok()); // touching endpoints are fine

        let err = constraints.set_forbidden_slots(vec![slot(6, 0, 9, 0), slot(8, 30, 10, 0)]);
        assert!(err.is_err());
        // previous (valid) assignment survives the failed attempt
        assert_eq!(constraints.forbidden_slots().len(), 2);
    }

    #[test]
    fn test_near_full_day_coverage_still_accepted() {
        // 12h + 11h59 = 23h59 stays strictly under the 24h ceiling
        let mut constraints = Constraints::default();
        constraints
            .set_forbidden_slots(vec![slot(0, 0, 12, 0), slot(12, 0, 23, 59)])
            .unwrap();
        assert_eq!(constraints.forbidden_slots().len(), 2);
    }

    #[test]
    fn test_add_forbidden_is_atomic() {
        let mut constraints = Constraints::default();
        constraints.add_forbidden(t(6, 0), t(8, 0)).unwrap();
        assert!(constraints.add_forbidden(t(7, 0), t(9, 0)).is_err());
        assert_eq!(constraints.forbidden_slots().len(), 1);
        constraints.add_forbidden(t(8, 0), t(9, 0)).unwrap();
        assert_eq!(constraints.forbidden_slots().len(), 2);
    }

    #[test]
    fn test_slots_are_stored_sorted() {
        let constraints = Constraints::new(
            ConsumptionProfile::flat(),
            vec![slot(20, 0, 22, 0), slot(2, 0, 4, 0)],
            10.0,
        )
        .unwrap();
        assert_eq!(constraints.forbidden_slots()[0].start(), t(2, 0));
    }

    #[test]
    fn test_minimum_temperature_bounds() {
        let mut constraints = Constraints::default();
        assert!(constraints.set_minimum_temperature(-0.1).is_err());
        assert!(constraints.set_minimum_temperature(95.1).is_err());
        assert!(constraints.set_minimum_temperature(95.0).is_ok());
        assert_eq!(constraints.minimum_temperature(), 95.0);
    }
}
