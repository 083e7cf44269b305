//! Per-hour alert deduplication.
//!
//! A student triggers at most one alert per calendar-hour window. The window
//! key carries the calendar date as well as the hour, so a key from 09:00
//! today never aliases 09:00 tomorrow.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashSet;

/// Calendar-hour bucket identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowKey {
    date: NaiveDate,
    hour: u32,
}

impl WindowKey {
    fn of(now: NaiveDateTime) -> Self {
        Self {
            date: now.date(),
            hour: now.hour(),
        }
    }
}

/// Tracks which students have already alerted in the current window.
#[derive(Debug, Default)]
pub struct AlertDeduper {
    window: Option<WindowKey>,
    alerted: HashSet<String>,
}

impl AlertDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the window if `now` crossed an hour boundary, clearing the
    /// alerted set. Exactly one clear per transition: calling this on every
    /// tick is cheap and a missed tick is recovered by key comparison on
    /// the next one.
    pub fn roll(&mut self, now: NaiveDateTime) {
        let key = WindowKey::of(now);
        if self.window != Some(key) {
            if self.window.is_some() {
                tracing::debug!(
                    date = %key.date,
                    hour = key.hour,
                    "alert window rolled over"
                );
            }
            self.window = Some(key);
            self.alerted.clear();
        }
    }

    /// Check-and-mark: returns `true` exactly once per student per window.
    ///
    /// Callers must serialize invocations (single-owner engine discipline);
    /// the check and the insert are one critical step here.
    pub fn should_alert(&mut self, student_id: &str, now: NaiveDateTime) -> bool {
        self.roll(now);
        if self.alerted.contains(student_id) {
            return false;
        }
        self.alerted.insert(student_id.to_string());
        true
    }

    /// Drop all window state (fresh monitoring session).
    pub fn reset(&mut self) {
        self.window = None;
        self.alerted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    #[test]
    fn test_single_alert_per_window() {
        let mut dedup = AlertDeduper::new();
        assert!(dedup.should_alert("a", at(9, 5)));
        assert!(!dedup.should_alert("a", at(9, 40)));
        assert!(!dedup.should_alert("a", at(9, 59)));
    }

    #[test]
    fn test_distinct_students_independent() {
        let mut dedup = AlertDeduper::new();
        assert!(dedup.should_alert("a", at(9, 5)));
        assert!(dedup.should_alert("b", at(9, 6)));
        assert!(!dedup.should_alert("a", at(9, 7)));
    }

    #[test]
    fn test_rollover_allows_exactly_one_more() {
        let mut dedup = AlertDeduper::new();
        assert!(dedup.should_alert("a", at(9, 5)));
        assert!(dedup.should_alert("a", at(10, 5)));
        assert!(!dedup.should_alert("a", at(10, 40)));
    }

    #[test]
    fn test_same_hour_next_day_is_new_window() {
        let mut dedup = AlertDeduper::new();
        let today = at(9, 5);
        let tomorrow = NaiveDate::from_ymd_opt(2025, 3, 11)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert!(dedup.should_alert("a", today));
        assert!(dedup.should_alert("a", tomorrow));
    }

    #[test]
    fn test_tick_roll_clears_on_boundary_only() {
        let mut dedup = AlertDeduper::new();
        assert!(dedup.should_alert("a", at(9, 58)));
        // Ticks inside the same hour never clear the set.
        dedup.roll(at(9, 59));
        assert!(!dedup.should_alert("a", at(9, 59)));
        // A tick past the boundary does.
        dedup.roll(at(10, 0));
        assert!(dedup.should_alert("a", at(10, 0)));
    }

    #[test]
    fn test_reset_forgets_everything() {
        let mut dedup = AlertDeduper::new();
        assert!(dedup.should_alert("a", at(9, 5)));
        dedup.reset();
        assert!(dedup.should_alert("a", at(9, 6)));
    }
}
