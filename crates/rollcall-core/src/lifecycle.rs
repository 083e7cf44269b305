//! Monitoring lifecycle state machine.
//!
//! `Idle` until attendance is submitted; submission is one-way for the
//! session and implicitly starts monitoring. Toggling flips between
//! `Active` and `Paused` and is rejected before submission.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("attendance has not been submitted; monitoring cannot be toggled")]
    NotSubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringState {
    Idle,
    Active,
    Paused,
}

impl MonitoringState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringState::Idle => "idle",
            MonitoringState::Active => "active",
            MonitoringState::Paused => "paused",
        }
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    state: MonitoringState,
    submitted: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: MonitoringState::Idle,
            submitted: false,
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit attendance. The first call activates monitoring and returns
    /// `true`; every later call is a no-op returning `false` — repeated
    /// submission must not restart the session.
    pub fn submit(&mut self) -> bool {
        if self.submitted {
            return false;
        }
        self.submitted = true;
        self.state = MonitoringState::Active;
        true
    }

    /// Flip between `Active` and `Paused`.
    ///
    /// Rejected before submission; the state is left untouched so the
    /// caller can surface the error and carry on.
    pub fn toggle(&mut self) -> Result<MonitoringState, TransitionError> {
        if !self.submitted {
            return Err(TransitionError::NotSubmitted);
        }
        self.state = match self.state {
            MonitoringState::Active => MonitoringState::Paused,
            MonitoringState::Idle | MonitoringState::Paused => MonitoringState::Active,
        };
        Ok(self.state)
    }

    pub fn state(&self) -> MonitoringState {
        self.state
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Whether recognition events may enter the pipeline.
    pub fn is_active(&self) -> bool {
        self.state == MonitoringState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_idle_unsubmitted() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), MonitoringState::Idle);
        assert!(!lc.is_submitted());
        assert!(!lc.is_active());
    }

    #[test]
    fn test_toggle_before_submit_rejected_state_unchanged() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.toggle(), Err(TransitionError::NotSubmitted));
        assert_eq!(lc.state(), MonitoringState::Idle);
    }

    #[test]
    fn test_submit_activates() {
        let mut lc = Lifecycle::new();
        assert!(lc.submit());
        assert_eq!(lc.state(), MonitoringState::Active);
        assert!(lc.is_active());
    }

    #[test]
    fn test_double_submit_is_noop() {
        let mut lc = Lifecycle::new();
        assert!(lc.submit());
        assert!(!lc.submit());
        assert_eq!(lc.state(), MonitoringState::Active);
    }

    #[test]
    fn test_toggle_twice_returns_to_active() {
        let mut lc = Lifecycle::new();
        lc.submit();
        assert_eq!(lc.toggle(), Ok(MonitoringState::Paused));
        assert_eq!(lc.toggle(), Ok(MonitoringState::Active));
    }

    #[test]
    fn test_submit_after_pause_does_not_resume() {
        let mut lc = Lifecycle::new();
        lc.submit();
        lc.toggle().unwrap();
        assert!(!lc.submit());
        assert_eq!(lc.state(), MonitoringState::Paused);
    }
}
