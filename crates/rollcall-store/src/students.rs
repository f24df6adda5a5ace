//! Student records.

use crate::password;
use crate::{Db, StoreError};
use rusqlite::{params, OptionalExtension};

/// A stored student row. `descriptor` is the serialized face descriptor
/// (JSON array of floats), opaque at this layer.
#[derive(Debug, Clone)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub password_hash: String,
    pub descriptor: Option<String>,
    pub profile_image: Option<String>,
    pub email: Option<String>,
    pub created_at: String,
}

/// Fields for creating a student (admin add or approved registration).
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub password_hash: String,
    pub descriptor: Option<String>,
    pub profile_image: Option<String>,
    pub email: Option<String>,
}

fn student_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        class_name: row.get(2)?,
        password_hash: row.get(3)?,
        descriptor: row.get(4)?,
        profile_image: row.get(5)?,
        email: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const STUDENT_COLUMNS: &str =
    "id, name, class_name, password_hash, descriptor, profile_image, email, created_at";

impl Db {
    pub fn insert_student(&self, new: &NewStudent) -> Result<(), StoreError> {
        if self.get_student(&new.id)?.is_some() {
            return Err(StoreError::DuplicateStudent(new.id.clone()));
        }
        self.conn.execute(
            "INSERT INTO students (id, name, class_name, password_hash, descriptor, profile_image, email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.id,
                new.name,
                new.class_name,
                new.password_hash,
                new.descriptor,
                new.profile_image,
                new.email
            ],
        )?;
        tracing::info!(student_id = %new.id, "student created");
        Ok(())
    }

    pub fn get_student(&self, id: &str) -> Result<Option<Student>, StoreError> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
                [id],
                student_from_row,
            )
            .optional()?;
        Ok(result)
    }

    pub fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY id"))?;
        let rows = stmt.query_map([], student_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Attach a descriptor to a student that does not have one yet.
    ///
    /// Descriptors are immutable once set; there is no re-enrollment flow.
    pub fn set_descriptor(&self, id: &str, descriptor: &str) -> Result<(), StoreError> {
        let student = self
            .get_student(id)?
            .ok_or_else(|| StoreError::StudentNotFound(id.to_string()))?;
        if student.descriptor.is_some() {
            return Err(StoreError::DescriptorAlreadySet(id.to_string()));
        }
        self.conn.execute(
            "UPDATE students SET descriptor = ?1 WHERE id = ?2 AND descriptor IS NULL",
            params![descriptor, id],
        )?;
        Ok(())
    }

    /// Password login check. Returns the student on success.
    pub fn verify_student(&self, id: &str, pw: &str) -> Result<Option<Student>, StoreError> {
        match self.get_student(id)? {
            Some(s) if password::verify_password(pw, &s.password_hash) => Ok(Some(s)),
            _ => Ok(None),
        }
    }
}
