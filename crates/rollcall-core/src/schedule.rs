//! Class timetable and the one-shot reminder scheduler.
//!
//! Driven by the same wall-clock tick as the dedup rollover check. The
//! scheduler compares the minute-truncated time against class-start
//! boundaries and remembers the last slot it fired for, so a sub-minute
//! tick cadence still yields exactly one reminder per slot.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Class,
    Break,
}

/// One block of the school day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBlock {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub kind: BlockKind,
}

impl ScheduleBlock {
    pub fn new(start: NaiveTime, end: NaiveTime, kind: BlockKind) -> Self {
        Self { start, end, kind }
    }
}

/// The day's timetable plus the reminder memo.
#[derive(Debug)]
pub struct ReminderSchedule {
    blocks: Vec<ScheduleBlock>,
    last_fired: Option<NaiveTime>,
}

fn hm(hour: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, min, 0).expect("static timetable times are valid")
}

impl ReminderSchedule {
    pub fn new(blocks: Vec<ScheduleBlock>) -> Self {
        Self {
            blocks,
            last_fired: None,
        }
    }

    /// The standard school day: six classes around three breaks.
    pub fn standard() -> Self {
        use BlockKind::*;
        Self::new(vec![
            ScheduleBlock::new(hm(9, 0), hm(10, 0), Class),
            ScheduleBlock::new(hm(10, 0), hm(10, 45), Class),
            ScheduleBlock::new(hm(10, 45), hm(11, 0), Break),
            ScheduleBlock::new(hm(11, 0), hm(12, 0), Class),
            ScheduleBlock::new(hm(12, 0), hm(12, 45), Class),
            ScheduleBlock::new(hm(12, 45), hm(13, 30), Break),
            ScheduleBlock::new(hm(13, 30), hm(14, 30), Class),
            ScheduleBlock::new(hm(14, 30), hm(15, 30), Class),
            ScheduleBlock::new(hm(15, 30), hm(15, 45), Break),
            ScheduleBlock::new(hm(15, 45), hm(16, 20), Class),
        ])
    }

    pub fn blocks(&self) -> &[ScheduleBlock] {
        &self.blocks
    }

    /// Fire at most one reminder per class-start slot.
    ///
    /// Returns the slot when `now` (truncated to the minute) is a class
    /// start that differs from the last fired slot. Any tick landing inside
    /// the start minute triggers it; later ticks in the same minute do not.
    pub fn check_reminder(&mut self, now: NaiveDateTime) -> Option<NaiveTime> {
        let minute = truncate_to_minute(now.time());
        let is_class_start = self
            .blocks
            .iter()
            .any(|b| b.kind == BlockKind::Class && b.start == minute);
        if is_class_start && self.last_fired != Some(minute) {
            self.last_fired = Some(minute);
            tracing::debug!(slot = %minute.format("%H:%M"), "class reminder fired");
            return Some(minute);
        }
        None
    }

    /// The block covering `now`, if any (start inclusive, end exclusive).
    pub fn current_block(&self, now: NaiveDateTime) -> Option<&ScheduleBlock> {
        let t = now.time();
        self.blocks.iter().find(|b| b.start <= t && t < b.end)
    }
}

impl Default for ReminderSchedule {
    fn default() -> Self {
        Self::standard()
    }
}

fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).expect("hour and minute are in range")
}
