use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::session::{SessionStore, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    config: AuthConfig,
}

impl TokenIssuer {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            iat: now.timestamp(),
            exp: (now + self.config.token_ttl).timestamp(),
            iss: self.config.issuer().to_string(),
            aud: self.config.audience().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.secret()),
        )
        .map_err(|err| AuthError::Signing {
            message: err.to_string(),
        })
    }

    /// Exchange a live session for a short-lived bearer token.
    pub fn issue_for_session(
        &self,
        sessions: &SessionStore,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let user = sessions.user_for_session(session_token, now)?;
        self.issue(&user, now)
    }

    /// Check signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer()]);
        validation.set_audience(&[self.config.audience()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => {
                warn!(error = %err, "rejected bearer token");
                AuthError::InvalidToken {
                    message: err.to_string(),
                }
            }
        })
    }

    pub fn verify_authorization_header(&self, header: Option<&str>) -> Result<Claims> {
        let token = bearer_token(header.ok_or(AuthError::MissingBearer)?)?;
        self.verify(token)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header: &str) -> Result<&str> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MissingBearer)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MissingBearer);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const SECRET: &str = "0123456789abcdef0123";

    fn issuer(app_url: &str) -> TokenIssuer {
        TokenIssuer::new(AuthConfig::new(SECRET, app_url).unwrap())
    }

    fn user() -> User {
        User {
            id: "u1".into(),
            email: "ada@example.com".into(),
            name: "Ada".into(),
        }
    }

    #[test]
    fn issued_token_verifies_with_user_claims() {
        let issuer = issuer("http://localhost:3000");
        let token = issuer.issue(&user(), Utc::now()).unwrap();
        let claims = issuer
            .verify_authorization_header(Some(&format!("Bearer {token}")))
            .unwrap();

        assert_eq!(claims.id, "u1");
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.name, "Ada");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.iss, "http://localhost:3000");
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer("http://localhost:3000");
        let token = issuer
            .issue(&user(), Utc::now() - Duration::hours(3))
            .unwrap();
        assert_eq!(issuer.verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn other_audience_is_rejected() {
        let token = issuer("http://other.test").issue(&user(), Utc::now()).unwrap();
        assert!(matches!(
            issuer("http://localhost:3000").verify(&token),
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = issuer("http://localhost:3000").issue(&user(), Utc::now()).unwrap();
        let other = TokenIssuer::new(
            AuthConfig::new("ffffffffffffffffffff", "http://localhost:3000").unwrap(),
        );
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn session_token_exchanges_for_jwt() {
        let config = AuthConfig::new(SECRET, "http://localhost:3000").unwrap();
        let sessions = SessionStore::new(config.clone());
        let issuer = TokenIssuer::new(config);
        let session = sessions
            .sign_up("ada@example.com", "correct horse", "Ada", Utc::now())
            .unwrap();

        let token = issuer
            .issue_for_session(&sessions, &session.token, Utc::now())
            .unwrap();
        assert_eq!(issuer.verify(&token).unwrap().id, session.user_id);
        assert!(issuer
            .issue_for_session(&sessions, "unknown", Utc::now())
            .is_err());
    }

    #[rstest]
    #[case("Bearer abc", Ok("abc"))]
    #[case("bearer   abc ", Ok("abc"))]
    #[case("Basic abc", Err(AuthError::MissingBearer))]
    #[case("Bearer", Err(AuthError::MissingBearer))]
    #[case("Bearer ", Err(AuthError::MissingBearer))]
    fn parses_bearer_header(#[case] header: &str, #[case] expected: Result<&str>) {
        assert_eq!(bearer_token(header), expected);
    }

    #[test]
    fn missing_header_is_reported() {
        assert_eq!(
            issuer("http://localhost:3000").verify_authorization_header(None),
            Err(AuthError::MissingBearer)
        );
    }
}
