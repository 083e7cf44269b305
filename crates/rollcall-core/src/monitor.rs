//! The monitoring engine: one struct owning roster, deduplicator, alert
//! history, lifecycle, and the reminder schedule.
//!
//! All mutation goes through the command methods below, and all time is an
//! explicit parameter. Callers (the daemon's engine actor) serialize access,
//! which is what makes the deduplicator's check-and-mark atomic.

use crate::alerts::{Alert, AlertLog, ABSENCE_ALERT_MESSAGE};
use crate::dedup::AlertDeduper;
use crate::lifecycle::{Lifecycle, MonitoringState, TransitionError};
use crate::roster::{AttendanceStats, Roster, RosterError, Student};
use crate::schedule::{ReminderSchedule, ScheduleBlock};
use crate::types::RecognitionEvent;
use chrono::{NaiveDateTime, NaiveTime};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MonitorError {
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Attendance monitor for one classroom session.
#[derive(Debug)]
pub struct Monitor {
    roster: Roster,
    dedup: AlertDeduper,
    alerts: AlertLog,
    lifecycle: Lifecycle,
    schedule: ReminderSchedule,
}

impl Monitor {
    pub fn new(roster: Roster, schedule: ReminderSchedule) -> Self {
        Self {
            roster,
            dedup: AlertDeduper::new(),
            alerts: AlertLog::new(),
            lifecycle: Lifecycle::new(),
            schedule,
        }
    }

    /// Submit attendance and start monitoring.
    ///
    /// The first submission clears any stale alerts and dedup state so the
    /// session starts fresh; repeated submissions are no-ops and must not
    /// reset anything. Returns whether this call started the session.
    pub fn submit(&mut self) -> bool {
        if !self.lifecycle.submit() {
            return false;
        }
        self.dedup.reset();
        self.alerts.clear();
        tracing::info!("attendance submitted, monitoring started");
        true
    }

    /// Pause or resume monitoring. Fails before submission.
    pub fn toggle(&mut self) -> Result<MonitoringState, MonitorError> {
        let state = self.lifecycle.toggle()?;
        tracing::info!(state = state.as_str(), "monitoring toggled");
        Ok(state)
    }

    pub fn set_presence(&mut self, id: &str, present: bool) -> Result<(), MonitorError> {
        self.roster.set_presence(id, present)?;
        Ok(())
    }

    pub fn set_permission(&mut self, id: &str, permitted: bool) -> Result<(), MonitorError> {
        self.roster.set_permission(id, permitted)?;
        Ok(())
    }

    /// Feed one recognition event through the alert pipeline.
    ///
    /// Returns the alert to deliver, or `None` when the event is dropped:
    /// monitoring not active, no identity, unknown identity, student
    /// present or permitted, or already alerted this window.
    pub fn on_recognition(&mut self, event: &RecognitionEvent) -> Option<Alert> {
        if !self.lifecycle.is_active() {
            return None;
        }

        let id = event.student_id.as_deref()?;
        let student = match self.roster.get(id) {
            Some(s) => s.clone(),
            None => {
                tracing::debug!(student = id, "recognition for unknown student dropped");
                return None;
            }
        };

        if student.is_present || student.has_permission {
            return None;
        }

        if !self.dedup.should_alert(id, event.timestamp) {
            return None;
        }

        let alert = self
            .alerts
            .emit(&student, event.timestamp, ABSENCE_ALERT_MESSAGE);
        tracing::warn!(
            student = %alert.student_name,
            confidence = event.confidence,
            "absence alert emitted"
        );
        Some(alert)
    }

    /// Wall-clock tick: advance the dedup window and check class reminders.
    ///
    /// Returns the class-start slot when a reminder should fire.
    pub fn tick(&mut self, now: NaiveDateTime) -> Option<NaiveTime> {
        self.dedup.roll(now);
        self.schedule.check_reminder(now)
    }

    pub fn stats(&self) -> AttendanceStats {
        self.roster.stats()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.snapshot()
    }

    pub fn state(&self) -> MonitoringState {
        self.lifecycle.state()
    }

    pub fn is_submitted(&self) -> bool {
        self.lifecycle.is_submitted()
    }

    pub fn students(&self) -> &[Student] {
        self.roster.snapshot()
    }

    /// Relay a created student record into the session roster.
    pub fn add_student(&mut self, student: Student) {
        self.roster.insert(student);
    }

    /// Relay a deletion into the session roster.
    pub fn remove_student(&mut self, id: &str) -> Result<Student, MonitorError> {
        Ok(self.roster.remove(id)?)
    }

    pub fn current_block(&self, now: NaiveDateTime) -> Option<&ScheduleBlock> {
        self.schedule.current_block(now)
    }
}
