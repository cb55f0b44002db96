//! User and session operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::User;

/// A user row together with its stored password hash
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let created_at: String = row.get(2)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Create a user. The email must already be normalized.
    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let conn = self.conn()?;
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
            params![id, email, password_hash, format_datetime(created_at)],
        )?;
        if inserted == 0 {
            return Err(Error::Conflict(format!("Email already registered: {}", email)));
        }

        Ok(User {
            id,
            email: email.to_string(),
            created_at: parse_datetime(&format_datetime(created_at)),
        })
    }

    /// Look up a user and password hash by normalized email
    pub fn get_user_credentials(&self, email: &str) -> Result<Option<UserCredentials>> {
        let conn = self.conn()?;
        let creds = conn
            .query_row(
                "SELECT id, email, created_at, password_hash FROM users WHERE email = ?",
                params![email],
                |row| {
                    Ok(UserCredentials {
                        user: row_to_user(row)?,
                        password_hash: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(creds)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, email, created_at FROM users WHERE id = ?",
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Record a session keyed by the hash of its token
    pub fn create_session(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?, ?, ?)",
            params![token_hash, user_id, format_datetime(expires_at)],
        )?;
        Ok(())
    }

    /// Resolve an unexpired session to its user and expiry
    pub fn get_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(User, DateTime<Utc>)>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                r#"
                SELECT u.id, u.email, u.created_at, s.expires_at
                FROM sessions s
                JOIN users u ON u.id = s.user_id
                WHERE s.token_hash = ? AND s.expires_at > ?
                "#,
                params![token_hash, format_datetime(now)],
                |row| {
                    let expires_at: String = row.get(3)?;
                    Ok((row_to_user(row)?, parse_datetime(&expires_at)))
                },
            )
            .optional()?;
        Ok(found)
    }

    /// Delete a session, returning the user it belonged to
    pub fn delete_session(&self, token_hash: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let user_id: Option<String> = conn
            .query_row(
                "SELECT user_id FROM sessions WHERE token_hash = ?",
                params![token_hash],
                |row| row.get(0),
            )
            .optional()?;

        if user_id.is_some() {
            conn.execute(
                "DELETE FROM sessions WHERE token_hash = ?",
                params![token_hash],
            )?;
        }
        Ok(user_id)
    }

    /// Remove expired sessions, returning how many were deleted
    pub fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?",
            params![format_datetime(now)],
        )?;
        Ok(deleted)
    }

    /// Number of stored sessions, expired or not
    pub fn count_sessions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_create_user_rejects_duplicate_email() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ana@example.com", "hash").unwrap();
        assert_eq!(user.email, "ana@example.com");

        assert!(matches!(
            db.create_user("ana@example.com", "other"),
            Err(Error::Conflict(_))
        ));

        let creds = db.get_user_credentials("ana@example.com").unwrap().unwrap();
        assert_eq!(creds.user.id, user.id);
        assert_eq!(creds.password_hash, "hash");
        assert!(db.get_user_credentials("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_session_lifecycle() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ana@example.com", "hash").unwrap();
        let now = Utc::now();

        db.create_session("live", &user.id, now + Duration::days(1)).unwrap();
        db.create_session("stale", &user.id, now - Duration::days(1)).unwrap();

        let (found, _) = db.get_session_user("live", now).unwrap().unwrap();
        assert_eq!(found, db.get_user(&user.id).unwrap().unwrap());
        assert!(db.get_session_user("stale", now).unwrap().is_none());
        assert!(db.get_session_user("missing", now).unwrap().is_none());

        assert_eq!(db.purge_expired_sessions(now).unwrap(), 1);
        assert_eq!(db.delete_session("live").unwrap(), Some(user.id));
        assert_eq!(db.delete_session("live").unwrap(), None);
    }
}
