//! rollcall-store — SQLite persistence for the attendance application.
//!
//! A single [`Db`] owns the connection; the operation groups (students,
//! attendance, admins, registration requests) live in their own modules as
//! `impl Db` blocks. Descriptors pass through as opaque text — this crate
//! never parses them.

pub mod admins;
pub mod attendance;
pub mod password;
pub mod requests;
mod schema;
pub mod students;

pub use admins::Admin;
pub use attendance::{AttendanceRecord, MarkOutcome};
pub use requests::{RegistrationRequest, RequestStatus};
pub use students::{NewStudent, Student};

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error("student id already exists: {0}")]
    DuplicateStudent(String),
    #[error("descriptor already set for student {0}; re-enrollment is not supported")]
    DescriptorAlreadySet(String),
    #[error("registration request not found: {0}")]
    RequestNotFound(String),
    #[error("registration request {0} is not pending")]
    RequestNotPending(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    /// Open (creating parent directories and tables as needed) a database
    /// file and seed the default admin if the admins table is empty.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and throwaway tooling.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(schema::SCHEMA)?;
        let db = Self { conn };
        db.ensure_default_admin()?;
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_parent_dirs_and_seeds_admin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rollcall.db");
        let db = Db::open(&path).unwrap();
        assert!(path.exists());
        assert!(db.get_admin("admin").unwrap().is_some());
    }

    #[test]
    fn test_reopen_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.db");
        {
            let db = Db::open(&path).unwrap();
            db.insert_student(&NewStudent {
                id: "S001".to_string(),
                name: "Asha Rao".to_string(),
                class_name: "10-B".to_string(),
                password_hash: password::hash_password("pw"),
                descriptor: None,
                profile_image: None,
                email: None,
            })
            .unwrap();
        }
        let db = Db::open(&path).unwrap();
        assert!(db.get_student("S001").unwrap().is_some());
    }
}
