use chrono::{NaiveTime, Timelike};
use std::fmt;

use crate::error::{OptimizerError, Result};

/// Half-open daily interval `[start, end)`.
///
/// Midnight crossing is not representable: `start` must be strictly before
/// `end` within the same day. Overnight windows are expressed as two slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(OptimizerError::validation(format!(
                "time slot start {start} must be before end {end} (midnight crossing is not supported)"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Open-interval intersection test.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when `start <= moment < end`.
    pub fn contains(&self, moment: NaiveTime) -> bool {
        self.start <= moment && moment < self.end
    }

    pub fn duration_minutes(&self) -> u32 {
        let start = self.start.hour() * 60 + self.start.minute();
        let end = self.end.hour() * 60 + self.end.minute();
        end - start
    }
}

impl PartialOrd for TimeSlot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeSlot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.start.cmp(&other.start).then(self.end.cmp(&other.end))
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} - {}]",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_rejects_inverted_and_empty_slots() {
        assert!(TimeSlot::new(t(8, 0), t(8, 0)).is_err());
        assert!(TimeSlot::new(t(22, 0), t(6, 0)).is_err());
    }

    #[test]
    fn test_overlap_is_open_interval() {
        let morning = TimeSlot::new(t(6, 0), t(9, 0)).unwrap();
        let late = TimeSlot::new(t(9, 0), t(12, 0)).unwrap();
        let overlapping = TimeSlot::new(t(8, 0), t(10, 0)).unwrap();

        // Touching endpoints do not overlap
        assert!(!morning.overlaps(&late));
        assert!(!late.overlaps(&morning));
        assert!(morning.overlaps(&overlapping));
    }

    #[test]
    fn test_containment_includes_start_excludes_end() {
        let slot = TimeSlot::new(t(6, 0), t(9, 0)).unwrap();
        assert!(slot.contains(t(6, 0)));
        assert!(slot.contains(t(8, 59)));
        assert!(!slot.contains(t(9, 0)));
        assert!(!slot.contains(t(5, 59)));
    }

    #[test]
    fn test_duration_minutes() {
        let slot = TimeSlot::new(t(6, 30), t(9, 0)).unwrap();
        assert_eq!(slot.duration_minutes(), 150);
    }

    #[test]
    fn test_ordering_by_start() {
        let a = TimeSlot::new(t(6, 0), t(9, 0)).unwrap();
        let b = TimeSlot::new(t(10, 0), t(11, 0)).unwrap();
        let mut slots = vec![b, a];
        slots.sort();
        assert_eq!(slots[0], a);
    }

    #[test]
    fn test_display_format() {
        let slot = TimeSlot::new(t(6, 5), t(21, 30)).unwrap();
        assert_eq!(slot.to_string(), "[06:05 - 21:30]");
    }
}
