//! Self-registration requests and the admin approval workflow.

use crate::students::NewStudent;
use crate::{Db, StoreError};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub id: String,
    pub student_id: String,
    pub name: String,
    pub class_name: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub profile_image: Option<String>,
    pub descriptor: Option<String>,
    pub status: String,
    pub admin_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

const REQUEST_COLUMNS: &str = "id, student_id, name, class_name, password_hash, email, \
                               profile_image, descriptor, status, admin_notes, created_at, updated_at";

fn request_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RegistrationRequest> {
    Ok(RegistrationRequest {
        id: row.get(0)?,
        student_id: row.get(1)?,
        name: row.get(2)?,
        class_name: row.get(3)?,
        password_hash: row.get(4)?,
        email: row.get(5)?,
        profile_image: row.get(6)?,
        descriptor: row.get(7)?,
        status: row.get(8)?,
        admin_notes: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl Db {
    /// File a self-registration request. The student id must not collide
    /// with an enrolled student or another request. Returns the request id.
    pub fn submit_request(&self, new: &NewStudent) -> Result<String, StoreError> {
        if self.get_student(&new.id)?.is_some() {
            return Err(StoreError::DuplicateStudent(new.id.clone()));
        }
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM registration_requests WHERE student_id = ?1",
            [&new.id],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(StoreError::DuplicateStudent(new.id.clone()));
        }

        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO registration_requests
                 (id, student_id, name, class_name, password_hash, email, profile_image, descriptor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                new.id,
                new.name,
                new.class_name,
                new.password_hash,
                new.email,
                new.profile_image,
                new.descriptor
            ],
        )?;
        tracing::info!(request_id = %id, student_id = %new.id, "registration request submitted");
        Ok(id)
    }

    pub fn get_request(&self, id: &str) -> Result<Option<RegistrationRequest>, StoreError> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM registration_requests WHERE id = ?1"),
                [id],
                request_from_row,
            )
            .optional()?;
        Ok(result)
    }

    pub fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<RegistrationRequest>, StoreError> {
        match status {
            Some(status) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM registration_requests \
                     WHERE status = ?1 ORDER BY created_at"
                ))?;
                let rows = stmt.query_map([status.as_str()], request_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM registration_requests ORDER BY created_at"
                ))?;
                let rows = stmt.query_map([], request_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
        }
    }

    /// Approve a pending request: creates the student and flips the request
    /// status in one transaction.
    pub fn approve_request(
        &mut self,
        id: &str,
        notes: Option<&str>,
    ) -> Result<RegistrationRequest, StoreError> {
        let request = self
            .get_request(id)?
            .ok_or_else(|| StoreError::RequestNotFound(id.to_string()))?;
        if request.status != RequestStatus::Pending.as_str() {
            return Err(StoreError::RequestNotPending(id.to_string()));
        }
        // Re-check: the id may have been enrolled since the request was filed.
        if self.get_student(&request.student_id)?.is_some() {
            return Err(StoreError::DuplicateStudent(request.student_id.clone()));
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO students (id, name, class_name, password_hash, descriptor, profile_image, email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                request.student_id,
                request.name,
                request.class_name,
                request.password_hash,
                request.descriptor,
                request.profile_image,
                request.email
            ],
        )?;
        tx.execute(
            "UPDATE registration_requests
             SET status = ?1, admin_notes = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?3",
            params![RequestStatus::Approved.as_str(), notes, id],
        )?;
        tx.commit()?;

        tracing::info!(request_id = %id, student_id = %request.student_id, "registration approved");
        self.get_request(id)?
            .ok_or_else(|| StoreError::RequestNotFound(id.to_string()))
    }

    pub fn reject_request(
        &self,
        id: &str,
        notes: Option<&str>,
    ) -> Result<RegistrationRequest, StoreError> {
        let request = self
            .get_request(id)?
            .ok_or_else(|| StoreError::RequestNotFound(id.to_string()))?;
        if request.status != RequestStatus::Pending.as_str() {
            return Err(StoreError::RequestNotPending(id.to_string()));
        }
        self.conn.execute(
            "UPDATE registration_requests
             SET status = ?1, admin_notes = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?3",
            params![RequestStatus::Rejected.as_str(), notes, id],
        )?;
        tracing::info!(request_id = %id, student_id = %request.student_id, "registration rejected");
        self.get_request(id)?
            .ok_or_else(|| StoreError::RequestNotFound(id.to_string()))
    }
}
