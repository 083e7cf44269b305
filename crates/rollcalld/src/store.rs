//! SQLite-backed student store.
//!
//! Durable roster records live here; session flags are mirrored into the
//! in-memory roster, which stays authoritative for the monitoring pipeline.
//! Runs on the engine thread, so plain blocking rusqlite is fine.

use chrono::Local;
use rollcall_core::{Embedding, GalleryEntry, Student};
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unknown student: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("descriptor decode failed: {0}")]
    BadDescriptor(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS students (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    photo_ref       TEXT,
    is_present      INTEGER NOT NULL DEFAULT 0,
    has_permission  INTEGER NOT NULL DEFAULT 0,
    descriptor      TEXT,
    created_at      TEXT NOT NULL
);
";

pub struct RosterStore {
    conn: Connection,
}

impl RosterStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// All students, oldest enrollment first (the roster's insertion order).
    pub fn list(&self) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, photo_ref, is_present, has_permission
             FROM students ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Student {
                id: row.get(0)?,
                name: row.get(1)?,
                photo_ref: row.get(2)?,
                is_present: row.get(3)?,
                has_permission: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Create a student with a fresh id, absent and unpermitted.
    pub fn create(&self, name: &str, photo_ref: Option<&str>) -> Result<Student, StoreError> {
        let student = Student {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            photo_ref: photo_ref.map(str::to_string),
            is_present: false,
            has_permission: false,
        };
        self.conn.execute(
            "INSERT INTO students (id, name, photo_ref, is_present, has_permission, created_at)
             VALUES (?1, ?2, ?3, 0, 0, ?4)",
            params![
                student.id,
                student.name,
                student.photo_ref,
                Local::now().to_rfc3339()
            ],
        )?;
        Ok(student)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM students WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Update either or both session flags. `None` leaves a flag as-is.
    pub fn update_flags(
        &self,
        id: &str,
        is_present: Option<bool>,
        has_permission: Option<bool>,
    ) -> Result<(), StoreError> {
        let n = self.conn.execute(
            "UPDATE students
             SET is_present = COALESCE(?2, is_present),
                 has_permission = COALESCE(?3, has_permission)
             WHERE id = ?1",
            params![id, is_present, has_permission],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Attach (or replace) the enrolled face descriptor for a student.
    pub fn set_descriptor(&self, id: &str, embedding: &Embedding) -> Result<(), StoreError> {
        let json = serde_json::to_string(&embedding.values)?;
        let n = self.conn.execute(
            "UPDATE students SET descriptor = ?2 WHERE id = ?1",
            params![id, json],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Enrolled reference embeddings for every student that has one.
    pub fn gallery(&self) -> Result<Vec<GalleryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, descriptor FROM students WHERE descriptor IS NOT NULL ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (id, json) = row?;
            let values: Vec<f32> = serde_json::from_str(&json)?;
            entries.push(GalleryEntry {
                student_id: id,
                embedding: Embedding::new(values),
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_list_in_enrollment_order() {
        let store = RosterStore::open_in_memory().unwrap();
        let a = store.create("Avi", None).unwrap();
        let b = store.create("Bea", Some("photos/bea.jpg")).unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a.id);
        assert_eq!(listed[1].id, b.id);
        assert_eq!(listed[1].photo_ref.as_deref(), Some("photos/bea.jpg"));
        assert!(!listed[0].is_present);
    }

    #[test]
    fn test_update_flags_partial() {
        let store = RosterStore::open_in_memory().unwrap();
        let s = store.create("Avi", None).unwrap();
        store.update_flags(&s.id, Some(true), None).unwrap();
        let listed = store.list().unwrap();
        assert!(listed[0].is_present);
        assert!(!listed[0].has_permission);

        store.update_flags(&s.id, None, Some(true)).unwrap();
        let listed = store.list().unwrap();
        assert!(listed[0].is_present);
        assert!(listed[0].has_permission);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let store = RosterStore::open_in_memory().unwrap();
        assert!(matches!(
            store.update_flags("ghost", Some(true), None),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("ghost"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.set_descriptor("ghost", &Embedding::new(vec![1.0])),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_removes_record() {
        let store = RosterStore::open_in_memory().unwrap();
        let s = store.create("Avi", None).unwrap();
        store.delete(&s.id).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_descriptor_round_trip_through_gallery() {
        let store = RosterStore::open_in_memory().unwrap();
        let a = store.create("Avi", None).unwrap();
        let _without = store.create("Bea", None).unwrap();
        store
            .set_descriptor(&a.id, &Embedding::new(vec![0.1, 0.2, 0.3]))
            .unwrap();

        let gallery = store.gallery().unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery[0].student_id, a.id);
        assert_eq!(gallery[0].embedding.values, vec![0.1, 0.2, 0.3]);
    }
}
