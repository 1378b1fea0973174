//! Email/password accounts and opaque, sliding-expiry sessions kept in memory.

use std::collections::HashMap;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ulid::Ulid;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Account {
    user: User,
    /// PHC-format argon2 hash, salt included.
    password_hash: String,
}

#[derive(Debug, Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    sessions: HashMap<String, Session>,
}

#[derive(Debug)]
pub struct SessionStore {
    config: AuthConfig,
    inner: Mutex<Accounts>,
}

impl SessionStore {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Accounts::default()),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::invalid_input(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::invalid_input("Name is required"));
        }

        if self.inner.lock().by_email.contains_key(&email) {
            return Err(AuthError::EmailTaken { email });
        }
        let password_hash = hash_password(password)?;

        let mut inner = self.inner.lock();
        if inner.by_email.contains_key(&email) {
            return Err(AuthError::EmailTaken { email });
        }
        let account = Account {
            user: User {
                id: Ulid::new().to_string(),
                email: email.clone(),
                name: name.to_string(),
            },
            password_hash,
        };
        let user_id = account.user.id.clone();
        inner.by_email.insert(email, account);
        info!(user_id = %user_id, "account created");
        Ok(self.open_session(&mut inner, user_id, now))
    }

    pub fn sign_in(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<Session> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let account = self
            .inner
            .lock()
            .by_email
            .get(&email)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&account.password_hash, password) {
            return Err(AuthError::InvalidCredentials);
        }
        let mut inner = self.inner.lock();
        Ok(self.open_session(&mut inner, account.user.id, now))
    }

    /// Look up a live session, extending it once it is older than the refresh age.
    pub fn session(&self, token: &str, now: DateTime<Utc>) -> Result<Session> {
        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(token)
            .ok_or(AuthError::SessionNotFound)?;
        if session.expires_at <= now {
            inner.sessions.remove(token);
            return Err(AuthError::SessionExpired);
        }
        if now - session.updated_at >= self.config.session_refresh_age {
            session.expires_at = now + self.config.session_ttl;
            session.updated_at = now;
            debug!("session refreshed");
        }
        Ok(session.clone())
    }

    pub fn user_for_session(&self, token: &str, now: DateTime<Utc>) -> Result<User> {
        let session = self.session(token, now)?;
        let inner = self.inner.lock();
        inner
            .by_email
            .values()
            .find(|account| account.user.id == session.user_id)
            .map(|account| account.user.clone())
            .ok_or(AuthError::SessionNotFound)
    }

    pub fn sign_out(&self, token: &str) -> bool {
        self.inner.lock().sessions.remove(token).is_some()
    }

    pub fn live_sessions(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Opening a session also drops every session that has already expired.
    fn open_session(&self, inner: &mut Accounts, user_id: String, now: DateTime<Utc>) -> Session {
        let before = inner.sessions.len();
        inner.sessions.retain(|_, session| session.expires_at > now);
        let pruned = before - inner.sessions.len();
        if pruned > 0 {
            debug!(pruned, "dropped expired sessions");
        }

        let session = Session {
            token: Ulid::new().to_string(),
            user_id,
            expires_at: now + self.config.session_ttl,
            updated_at: now,
        };
        inner
            .sessions
            .insert(session.token.clone(), session.clone());
        session
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::invalid_input("A valid email address is required")),
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::PasswordHash {
            message: err.to_string(),
        })
}

/// Constant-time check of `password` against a stored PHC hash.
fn verify_password(password_hash: &str, password: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn store() -> SessionStore {
        SessionStore::new(AuthConfig::new("0123456789abcdef0123", "http://localhost:3000").unwrap())
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn sign_up_then_sign_in() {
        let store = store();
        let created = store
            .sign_up("Ada@Example.com", "correct horse", "Ada", now())
            .unwrap();
        let signed_in = store
            .sign_in("ada@example.com", "correct horse", now())
            .unwrap();

        assert_eq!(created.user_id, signed_in.user_id);
        assert_ne!(created.token, signed_in.token);
        assert_eq!(signed_in.expires_at, now() + Duration::days(7));
    }

    #[test]
    fn wrong_password_and_unknown_email_look_the_same() {
        let store = store();
        store
            .sign_up("ada@example.com", "correct horse", "Ada", now())
            .unwrap();
        assert_eq!(
            store.sign_in("ada@example.com", "wrong horse", now()),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            store.sign_in("bob@example.com", "correct horse", now()),
            Err(AuthError::InvalidCredentials)
        );
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let store = store();
        store
            .sign_up("ada@example.com", "correct horse", "Ada", now())
            .unwrap();
        assert!(matches!(
            store.sign_up("ADA@example.com", "another pass", "Ada", now()),
            Err(AuthError::EmailTaken { .. })
        ));
    }

    #[test]
    fn session_refreshes_after_a_day_and_expires_after_a_week() {
        let store = store();
        let session = store
            .sign_up("ada@example.com", "correct horse", "Ada", now())
            .unwrap();

        let early = store.session(&session.token, now() + Duration::hours(2)).unwrap();
        assert_eq!(early.expires_at, session.expires_at);

        let later = now() + Duration::days(2);
        let refreshed = store.session(&session.token, later).unwrap();
        assert_eq!(refreshed.expires_at, later + Duration::days(7));

        assert_eq!(
            store.session(&session.token, later + Duration::days(8)),
            Err(AuthError::SessionExpired)
        );
        assert_eq!(
            store.session(&session.token, later),
            Err(AuthError::SessionNotFound)
        );
    }

    #[test]
    fn sign_out_invalidates_the_session() {
        let store = store();
        let session = store
            .sign_up("ada@example.com", "correct horse", "Ada", now())
            .unwrap();
        assert!(store.sign_out(&session.token));
        assert!(store.user_for_session(&session.token, now()).is_err());
    }

    #[test]
    fn password_hashes_are_salted_argon2() {
        let first = hash_password("correct horse").unwrap();
        let second = hash_password("correct horse").unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(verify_password(&first, "correct horse"));
        assert!(!verify_password(&first, "correct horsE"));
        assert!(!verify_password("not a hash", "correct horse"));
    }

    #[test]
    fn opening_a_session_drops_expired_ones() {
        let store = store();
        store
            .sign_up("ada@example.com", "correct horse", "Ada", now())
            .unwrap();
        store
            .sign_in("ada@example.com", "correct horse", now())
            .unwrap();
        assert_eq!(store.live_sessions(), 2);

        let later = now() + Duration::days(8);
        store
            .sign_in("ada@example.com", "correct horse", later)
            .unwrap();
        assert_eq!(store.live_sessions(), 1);
    }
}
