//! Identity provider
//!
//! Email/password accounts with bearer-token sessions. Session changes are
//! broadcast so that per-user state can be reloaded or dropped.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Session, SessionEvent};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Default session lifetime
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 30;

const EVENT_CAPACITY: usize = 64;

/// Sign-up, sign-in and session lookup
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a new account and open a session for it
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session>;

    /// Open a session for an existing account
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Resolve a bearer token. Expired or unknown tokens are `None`.
    async fn session(&self, token: &str) -> Result<Option<Session>>;

    /// Invalidate a token. Unknown tokens are ignored.
    async fn sign_out(&self, token: &str) -> Result<()>;

    /// Observe sign-in and sign-out events
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// Trim and lower-case an email address, rejecting obviously invalid ones
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(Error::Validation(format!("Invalid email: {}", email))),
    }
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Identity provider backed by the application database
pub struct DbIdentity {
    db: Database,
    session_ttl: Duration,
    events: broadcast::Sender<SessionEvent>,
}

impl DbIdentity {
    pub fn new(db: Database) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
            events,
        }
    }

    /// Override the session lifetime
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Drop sessions that have already expired. Runs on every sign-in so the
    /// table only holds live tokens plus those expired since the last one.
    fn purge_expired(&self) {
        match self.db.purge_expired_sessions(Utc::now()) {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Purged expired sessions"),
            Err(e) => warn!(error = %e, "Failed to purge expired sessions"),
        }
    }

    fn open_session(&self, user: crate::models::User) -> Result<Session> {
        self.purge_expired();

        let token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + self.session_ttl;
        self.db
            .create_session(&hash_token(&token), &user.id, expires_at)?;

        // No receivers is fine
        let _ = self.events.send(SessionEvent::SignedIn {
            user_id: user.id.clone(),
        });

        Ok(Session {
            token,
            user,
            expires_at,
        })
    }
}

#[async_trait]
impl IdentityProvider for DbIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let user = self.db.create_user(&email, &hash_password(password)?)?;
        info!(user_id = %user.id, "User registered");
        self.open_session(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let invalid = || Error::Unauthorized("Invalid email or password".to_string());

        let email = normalize_email(email).map_err(|_| invalid())?;
        let creds = self.db.get_user_credentials(&email)?.ok_or_else(invalid)?;
        if !verify_password(password, &creds.password_hash) {
            debug!(user_id = %creds.user.id, "Password mismatch");
            return Err(invalid());
        }

        info!(user_id = %creds.user.id, "User signed in");
        self.open_session(creds.user)
    }

    async fn session(&self, token: &str) -> Result<Option<Session>> {
        let found = self.db.get_session_user(&hash_token(token), Utc::now())?;
        Ok(found.map(|(user, expires_at)| Session {
            token: token.to_string(),
            user,
            expires_at,
        }))
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        if let Some(user_id) = self.db.delete_session(&hash_token(token))? {
            info!(user_id = %user_id, "User signed out");
            let _ = self.events.send(SessionEvent::SignedOut { user_id });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> DbIdentity {
        DbIdentity::new(Database::in_memory().unwrap())
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Ana@Example.COM ").unwrap(),
            "ana@example.com"
        );
        assert!(normalize_email("ana").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ana@").is_err());
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let identity = provider();
        let signed_up = identity
            .sign_up("Ana@Example.com", "s3cret-pass")
            .await
            .unwrap();
        assert_eq!(signed_up.user.email, "ana@example.com");

        let signed_in = identity
            .sign_in("ana@example.com ", "s3cret-pass")
            .await
            .unwrap();
        assert_eq!(signed_in.user.id, signed_up.user.id);
        assert_ne!(signed_in.token, signed_up.token);

        let session = identity.session(&signed_in.token).await.unwrap().unwrap();
        assert_eq!(session.user.id, signed_up.user.id);
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let identity = provider();
        assert!(matches!(
            identity.sign_up("ana@example.com", "short").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            identity.sign_up("not-an-email", "long-enough").await,
            Err(Error::Validation(_))
        ));

        identity.sign_up("ana@example.com", "long-enough").await.unwrap();
        assert!(matches!(
            identity.sign_up("ANA@example.com", "long-enough").await,
            Err(Error::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_credentials_are_unauthorized() {
        let identity = provider();
        identity.sign_up("ana@example.com", "long-enough").await.unwrap();

        assert!(matches!(
            identity.sign_in("ana@example.com", "wrong-password").await,
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            identity.sign_in("nobody@example.com", "long-enough").await,
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_out_invalidates_token_and_emits_events() {
        let identity = provider();
        let mut events = identity.subscribe();

        let session = identity
            .sign_up("ana@example.com", "long-enough")
            .await
            .unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SignedIn {
                user_id: session.user.id.clone()
            }
        );

        identity.sign_out(&session.token).await.unwrap();
        assert!(identity.session(&session.token).await.unwrap().is_none());
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SignedOut {
                user_id: session.user.id.clone()
            }
        );

        // Signing out twice is harmless
        identity.sign_out(&session.token).await.unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_expired_session_is_absent() {
        let identity = provider().with_session_ttl(Duration::seconds(-1));
        let session = identity
            .sign_up("ana@example.com", "long-enough")
            .await
            .unwrap();
        assert!(identity.session(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_purges_expired_sessions() {
        let db = Database::in_memory().unwrap();
        let stale = DbIdentity::new(db.clone()).with_session_ttl(Duration::seconds(-1));
        stale.sign_up("ana@example.com", "long-enough").await.unwrap();
        assert_eq!(db.count_sessions().unwrap(), 1);

        let identity = DbIdentity::new(db.clone());
        let bruno = identity
            .sign_up("bruno@example.com", "long-enough")
            .await
            .unwrap();
        assert_eq!(db.count_sessions().unwrap(), 1);

        // Live sessions are kept
        let ana = identity
            .sign_in("ana@example.com", "long-enough")
            .await
            .unwrap();
        assert_eq!(db.count_sessions().unwrap(), 2);
        assert!(identity.session(&ana.token).await.unwrap().is_some());
        assert!(identity.session(&bruno.token).await.unwrap().is_some());
    }

    #[test]
    fn test_token_hash_is_hex_sha256() {
        let hash = hash_token("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
