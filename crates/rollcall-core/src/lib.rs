//! rollcall-core — classroom attendance monitoring engine.
//!
//! Correlates recognized-identity events against roster state, deduplicates
//! alerts per calendar hour, and drives one-shot class-start reminders.
//! Deterministic by construction: time always arrives as a parameter.

pub mod alerts;
pub mod dedup;
pub mod lifecycle;
pub mod matcher;
pub mod monitor;
pub mod roster;
pub mod schedule;
pub mod types;

pub use alerts::{Alert, AlertLog, ABSENCE_ALERT_MESSAGE, ALERT_HISTORY_CAP};
pub use lifecycle::{MonitoringState, TransitionError};
pub use matcher::{EuclideanMatcher, GalleryEntry, MatchOutcome, Matcher, MATCH_DISTANCE_THRESHOLD};
pub use monitor::{Monitor, MonitorError};
pub use roster::{AttendanceStats, Roster, RosterError, Student};
pub use schedule::{BlockKind, ReminderSchedule, ScheduleBlock};
pub use types::{Embedding, RecognitionEvent};
