//! Alert construction and the bounded alert history.

use crate::roster::Student;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of alerts retained, newest first.
pub const ALERT_HISTORY_CAP: usize = 8;

/// Message attached to every absence alert.
pub const ABSENCE_ALERT_MESSAGE: &str =
    "Recognized student absent without permission during class";

/// An emitted alert. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub timestamp: NaiveDateTime,
    pub message: String,
}

/// Bounded, newest-first alert history.
///
/// Emission only records; whether an alert fires at all is the
/// deduplicator's decision.
#[derive(Debug, Default)]
pub struct AlertLog {
    entries: VecDeque<Alert>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct an alert for `student` and push it to the front, evicting
    /// the oldest entry when the history is full.
    ///
    /// The id combines epoch milliseconds with the student id, so two
    /// alerts in the same millisecond (necessarily distinct students —
    /// the deduplicator admits each student once per window) never collide.
    pub fn emit(&mut self, student: &Student, now: NaiveDateTime, message: &str) -> Alert {
        let alert = Alert {
            id: format!("{}-{}", now.and_utc().timestamp_millis(), student.id),
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            timestamp: now,
            message: message.to_string(),
        };
        self.entries.push_front(alert.clone());
        self.entries.truncate(ALERT_HISTORY_CAP);
        alert
    }

    /// Newest-first copy of the history.
    pub fn snapshot(&self) -> Vec<Alert> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn student(id: &str, name: &str) -> Student {
        Student {
            id: id.to_string(),
            name: name.to_string(),
            photo_ref: None,
            is_present: false,
            has_permission: false,
        }
    }

    fn at(min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(9, min, 0)
            .unwrap()
    }

    #[test]
    fn test_history_capped_at_eight_newest_first() {
        let mut log = AlertLog::new();
        for i in 0..10u32 {
            let s = student(&format!("s{i}"), &format!("Student {i}"));
            log.emit(&s, at(i), ABSENCE_ALERT_MESSAGE);
        }
        let alerts = log.snapshot();
        assert_eq!(alerts.len(), ALERT_HISTORY_CAP);
        // Oldest two (s0, s1) evicted; newest (s9) at the front.
        assert_eq!(alerts[0].student_id, "s9");
        assert_eq!(alerts[7].student_id, "s2");
    }

    #[test]
    fn test_alert_fields() {
        let mut log = AlertLog::new();
        let alert = log.emit(&student("a", "Avi"), at(5), ABSENCE_ALERT_MESSAGE);
        assert_eq!(alert.student_id, "a");
        assert_eq!(alert.student_name, "Avi");
        assert_eq!(alert.message, ABSENCE_ALERT_MESSAGE);
        assert!(alert.id.ends_with("-a"));
    }

    #[test]
    fn test_ids_unique_for_same_instant_distinct_students() {
        let mut log = AlertLog::new();
        let a = log.emit(&student("a", "Avi"), at(5), ABSENCE_ALERT_MESSAGE);
        let b = log.emit(&student("b", "Bea"), at(5), ABSENCE_ALERT_MESSAGE);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_clear_empties_history() {
        let mut log = AlertLog::new();
        log.emit(&student("a", "Avi"), at(5), ABSENCE_ALERT_MESSAGE);
        log.clear();
        assert!(log.is_empty());
    }
}
