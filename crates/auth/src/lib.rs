//! Email/password sessions and bearer-token issuance for the task API.

pub mod config;
pub mod error;
pub mod jwt;
pub mod session;

pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use jwt::{bearer_token, Claims, TokenIssuer};
pub use session::{Session, SessionStore, User};
