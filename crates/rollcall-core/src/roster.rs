//! In-memory roster — the authoritative presence/permission view for the
//! active session. Mutated only through explicit commands; the persistent
//! student store relays its records in at startup and on CRUD changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RosterError {
    #[error("unknown student: {0}")]
    NotFound(String),
}

/// An enrolled student and their session flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub photo_ref: Option<String>,
    pub is_present: bool,
    pub has_permission: bool,
}

/// Aggregate attendance counters, derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub permitted: usize,
}

/// Insertion-ordered student collection.
///
/// Class-sized rosters make linear id lookup cheaper than maintaining a
/// separate index, and the Vec preserves the order `snapshot` must report.
#[derive(Debug, Default)]
pub struct Roster {
    students: Vec<Student>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_students(students: Vec<Student>) -> Self {
        Self { students }
    }

    /// Add a student. An existing record with the same id is replaced in
    /// place, keeping its original position.
    pub fn insert(&mut self, student: Student) {
        match self.students.iter_mut().find(|s| s.id == student.id) {
            Some(existing) => *existing = student,
            None => self.students.push(student),
        }
    }

    pub fn remove(&mut self, id: &str) -> Result<Student, RosterError> {
        match self.students.iter().position(|s| s.id == id) {
            Some(idx) => Ok(self.students.remove(idx)),
            None => Err(RosterError::NotFound(id.to_string())),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    /// Set the presence flag. Idempotent; `NotFound` leaves no trace.
    pub fn set_presence(&mut self, id: &str, present: bool) -> Result<(), RosterError> {
        let student = self
            .students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))?;
        student.is_present = present;
        Ok(())
    }

    /// Set the away-permission flag. Idempotent; `NotFound` leaves no trace.
    pub fn set_permission(&mut self, id: &str, permitted: bool) -> Result<(), RosterError> {
        let student = self
            .students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))?;
        student.has_permission = permitted;
        Ok(())
    }

    /// All students in insertion order.
    pub fn snapshot(&self) -> &[Student] {
        &self.students
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn stats(&self) -> AttendanceStats {
        AttendanceStats {
            total: self.students.len(),
            present: self.students.iter().filter(|s| s.is_present).count(),
            absent: self.students.iter().filter(|s| !s.is_present).count(),
            permitted: self.students.iter().filter(|s| s.has_permission).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, name: &str) -> Student {
        Student {
            id: id.to_string(),
            name: name.to_string(),
            photo_ref: None,
            is_present: false,
            has_permission: false,
        }
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let mut roster = Roster::new();
        roster.insert(student("b", "Bea"));
        roster.insert(student("a", "Avi"));
        roster.insert(student("c", "Caro"));
        let ids: Vec<&str> = roster.snapshot().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut roster = Roster::new();
        roster.insert(student("a", "Avi"));
        roster.insert(student("b", "Bea"));
        let mut updated = student("a", "Avi");
        updated.is_present = true;
        roster.insert(updated);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.snapshot()[0].id, "a");
        assert!(roster.snapshot()[0].is_present);
    }

    #[test]
    fn test_set_presence_unknown_id_fails_without_change() {
        let mut roster = Roster::new();
        roster.insert(student("a", "Avi"));
        let err = roster.set_presence("ghost", true).unwrap_err();
        assert_eq!(err, RosterError::NotFound("ghost".to_string()));
        assert!(!roster.get("a").unwrap().is_present);
    }

    #[test]
    fn test_set_flags_idempotent() {
        let mut roster = Roster::new();
        roster.insert(student("a", "Avi"));
        roster.set_presence("a", true).unwrap();
        roster.set_presence("a", true).unwrap();
        roster.set_permission("a", true).unwrap();
        roster.set_permission("a", true).unwrap();
        let s = roster.get("a").unwrap();
        assert!(s.is_present);
        assert!(s.has_permission);
    }

    #[test]
    fn test_stats_counts() {
        let mut roster = Roster::new();
        roster.insert(student("a", "Avi"));
        roster.insert(student("b", "Bea"));
        roster.insert(student("c", "Caro"));
        roster.set_presence("a", true).unwrap();
        roster.set_permission("b", true).unwrap();
        let stats = roster.stats();
        assert_eq!(
            stats,
            AttendanceStats {
                total: 3,
                present: 1,
                absent: 2,
                permitted: 1,
            }
        );
    }

    #[test]
    fn test_remove_returns_student() {
        let mut roster = Roster::new();
        roster.insert(student("a", "Avi"));
        let removed = roster.remove("a").unwrap();
        assert_eq!(removed.name, "Avi");
        assert!(roster.is_empty());
        assert!(roster.remove("a").is_err());
    }
}
