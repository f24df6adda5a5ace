//! Attendance records: one row per (student, date), never duplicated.

use crate::{Db, StoreError};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, OptionalExtension};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M:%S";

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: String,
    pub date: String,
    pub time: String,
    pub status: String,
}

/// Result of an attendance-marking attempt. Marking twice on the same day
/// is an idempotent no-op, reported distinctly so callers can tell the
/// student — it is not an error.
#[derive(Debug, Clone)]
pub enum MarkOutcome {
    Marked(AttendanceRecord),
    AlreadyMarked(AttendanceRecord),
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: row.get(0)?,
        student_id: row.get(1)?,
        date: row.get(2)?,
        time: row.get(3)?,
        status: row.get(4)?,
    })
}

const RECORD_COLUMNS: &str = "id, student_id, date, time, status";

impl Db {
    /// Mark a student present for `date`, idempotently.
    ///
    /// The check and insert run in one transaction so two near-simultaneous
    /// submissions cannot both insert; the UNIQUE(student_id, date)
    /// constraint backstops writers on other connections.
    pub fn mark_attendance(
        &mut self,
        student_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<MarkOutcome, StoreError> {
        if self.get_student(student_id)?.is_none() {
            return Err(StoreError::StudentNotFound(student_id.to_string()));
        }

        let date_s = date.format(DATE_FMT).to_string();
        let time_s = time.format(TIME_FMT).to_string();

        let tx = self.conn.transaction()?;
        let existing = tx
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM attendance WHERE student_id = ?1 AND date = ?2"
                ),
                params![student_id, date_s],
                record_from_row,
            )
            .optional()?;

        if let Some(record) = existing {
            tx.commit()?;
            tracing::debug!(student_id, date = %date_s, "attendance already marked today");
            return Ok(MarkOutcome::AlreadyMarked(record));
        }

        tx.execute(
            "INSERT OR IGNORE INTO attendance (student_id, date, time) VALUES (?1, ?2, ?3)",
            params![student_id, date_s, time_s],
        )?;
        let record = tx.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE student_id = ?1 AND date = ?2"),
            params![student_id, date_s],
            record_from_row,
        )?;
        tx.commit()?;

        if record.time == time_s {
            tracing::info!(student_id, date = %date_s, time = %time_s, "attendance marked");
            Ok(MarkOutcome::Marked(record))
        } else {
            // Lost the race to a concurrent writer; their row stands.
            Ok(MarkOutcome::AlreadyMarked(record))
        }
    }

    pub fn has_attendance_on(&self, student_id: &str, date: NaiveDate) -> Result<bool, StoreError> {
        let date_s = date.format(DATE_FMT).to_string();
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM attendance WHERE student_id = ?1 AND date = ?2",
            params![student_id, date_s],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn attendance_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance WHERE student_id = ?1 ORDER BY date"
        ))?;
        let rows = stmt.query_map([student_id], record_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_attendance(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance ORDER BY date, student_id"
        ))?;
        let rows = stmt.query_map([], record_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Admin correction: delete the record for (student, date). Returns
    /// whether a record existed.
    pub fn remove_attendance(
        &self,
        student_id: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let date_s = date.format(DATE_FMT).to_string();
        let changed = self.conn.execute(
            "DELETE FROM attendance WHERE student_id = ?1 AND date = ?2",
            params![student_id, date_s],
        )?;
        Ok(changed > 0)
    }

    /// Number of students marked present on `date` (dashboard stat).
    pub fn count_present_on(&self, date: NaiveDate) -> Result<i64, StoreError> {
        let date_s = date.format(DATE_FMT).to_string();
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM attendance WHERE date = ?1",
            params![date_s],
            |row| row.get(0),
        )?)
    }
}
