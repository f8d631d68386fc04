//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] medico_core::EmailError),

    /// Password does not satisfy the password policy.
    #[error("{0}")]
    WeakPassword(#[from] medico_core::PasswordError),

    /// Invalid credentials (wrong password or unknown email).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("an account with this email already exists")]
    AccountExists,

    /// No session cookie on the request.
    #[error("no session")]
    SessionMissing,

    /// Session cookie present but unknown or expired.
    #[error("session expired")]
    SessionExpired,

    /// Session belongs to another role than the endpoint requires.
    #[error("mismatched role")]
    RoleMismatch,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Collapse a repository conflict on account creation into
    /// [`AuthError::AccountExists`].
    pub(crate) fn from_create(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) if msg == crate::db::accounts::EMAIL_TAKEN => {
                Self::AccountExists
            }
            other => Self::Repository(other),
        }
    }
}
