use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Auth configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account already exists for {email}")]
    EmailTaken { email: String },

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("No bearer token provided")]
    MissingBearer,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    #[error("Failed to sign token: {message}")]
    Signing { message: String },

    #[error("Failed to hash password: {message}")]
    PasswordHash { message: String },
}

impl AuthError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether the caller should answer with 401 rather than a server error.
    pub fn is_unauthorized(&self) -> bool {
        !matches!(
            self,
            AuthError::Configuration { .. }
                | AuthError::Signing { .. }
                | AuthError::PasswordHash { .. }
        )
    }
}
