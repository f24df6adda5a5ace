//! SQLite schema. Executed as one batch at open; every statement is
//! idempotent.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    class_name    TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    descriptor    TEXT,
    profile_image TEXT,
    email         TEXT,
    created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS admins (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    full_name     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL REFERENCES students(id),
    date       TEXT NOT NULL,
    time       TEXT NOT NULL,
    status     TEXT NOT NULL DEFAULT 'present',
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (student_id, date)
);

CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date);

CREATE TABLE IF NOT EXISTS registration_requests (
    id            TEXT PRIMARY KEY,
    student_id    TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    class_name    TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    email         TEXT,
    profile_image TEXT,
    descriptor    TEXT,
    status        TEXT NOT NULL DEFAULT 'pending',
    admin_notes   TEXT,
    created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;
