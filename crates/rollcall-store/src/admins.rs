//! Admin accounts.

use crate::password;
use crate::{Db, StoreError};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
}

impl Db {
    /// Seed the default `admin`/`admin` account when the table is empty,
    /// so a fresh deployment is reachable. Logged loudly; the credential
    /// is expected to be changed immediately.
    pub(crate) fn ensure_default_admin(&self) -> Result<(), StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))?;
        if count == 0 {
            self.add_admin("admin", "admin", "System Administrator")?;
            tracing::warn!("default admin account created (admin/admin); change the password");
        }
        Ok(())
    }

    pub fn add_admin(&self, username: &str, pw: &str, full_name: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO admins (username, password_hash, full_name) VALUES (?1, ?2, ?3)",
            params![username, password::hash_password(pw), full_name],
        )?;
        Ok(())
    }

    pub fn get_admin(&self, username: &str) -> Result<Option<Admin>, StoreError> {
        let result = self
            .conn
            .query_row(
                "SELECT id, username, password_hash, full_name FROM admins WHERE username = ?1",
                [username],
                |row| {
                    Ok(Admin {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                        full_name: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    /// Password login check. Returns the admin on success.
    pub fn verify_admin(&self, username: &str, pw: &str) -> Result<Option<Admin>, StoreError> {
        match self.get_admin(username)? {
            Some(a) if password::verify_password(pw, &a.password_hash) => Ok(Some(a)),
            _ => Ok(None),
        }
    }
}
