use chrono::Duration;

use crate::error::{AuthError, Result};

pub const ENV_JWT_SECRET: &str = "TASKDECK_JWT_SECRET";
pub const ENV_APP_URL: &str = "TASKDECK_APP_URL";
pub const ENV_APP_URL_FALLBACK: &str = "NEXT_PUBLIC_APP_URL";

const DEFAULT_APP_URL: &str = "http://localhost:3000";
const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    jwt_secret: String,
    /// Used as both `iss` and `aud`.
    app_url: String,
    pub token_ttl: Duration,
    pub session_ttl: Duration,
    pub session_refresh_age: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>, app_url: impl Into<String>) -> Result<Self> {
        let jwt_secret = jwt_secret.into();
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::configuration(format!(
                "JWT secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        let app_url = app_url.into().trim().trim_end_matches('/').to_string();
        if app_url.is_empty() {
            return Err(AuthError::configuration("application URL is empty"));
        }
        Ok(Self {
            jwt_secret,
            app_url,
            token_ttl: Duration::hours(1),
            session_ttl: Duration::days(7),
            session_refresh_age: Duration::days(1),
        })
    }

    /// Resolve from environment-style lookups. The secret has no fallback.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(ENV_JWT_SECRET)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AuthError::configuration(format!("{ENV_JWT_SECRET} is not set")))?;
        let app_url = lookup(ENV_APP_URL)
            .or_else(|| lookup(ENV_APP_URL_FALLBACK))
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        Self::new(secret, app_url)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub(crate) fn secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    pub fn issuer(&self) -> &str {
        &self.app_url
    }

    pub fn audience(&self) -> &str {
        &self.app_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_secret_is_rejected() {
        let err = AuthConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(AuthConfig::new("short", DEFAULT_APP_URL).is_err());
    }

    #[test]
    fn app_url_defaults_and_trims() {
        let config = AuthConfig::from_lookup(|key| match key {
            ENV_JWT_SECRET => Some("0123456789abcdef0123".into()),
            ENV_APP_URL_FALLBACK => Some("https://tasks.example.com/".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.issuer(), "https://tasks.example.com");
        assert_eq!(config.token_ttl, Duration::hours(1));
        assert_eq!(config.session_ttl, Duration::days(7));
    }
}
