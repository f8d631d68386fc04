//! Authentication service.
//!
//! Password login for every role. A successful login opens a session in the
//! role's namespace of the [`SessionStore`]; the caller turns the returned
//! token into cookies.

mod error;

pub use error::AuthError;

use std::sync::LazyLock;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use uuid::Uuid;

use medico_core::{Email, ModeratorKind, Role, validate_password, validate_password_length};

use crate::db::AccountRepository;
use crate::services::session::{SessionStore, SessionToken};

/// A freshly opened session.
#[derive(Debug, Clone, Copy)]
pub struct LoginOutcome {
    /// ID of the authenticated account.
    pub user_id: Uuid,
    /// Token to hand back in the session cookie.
    pub token: SessionToken,
    /// Lifetime of the session.
    pub expires_in: Duration,
}

/// Authentication service.
pub struct AuthService<'a> {
    accounts: AccountRepository<'a>,
    sessions: &'a SessionStore,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, sessions: &'a SessionStore) -> Self {
        Self {
            accounts: AccountRepository::new(pool),
            sessions,
        }
    }

    /// Login with email and password for a fixed role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::WeakPassword` on
    /// malformed input.
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong.
    pub async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let email = Email::parse(email)?;
        validate_password_length(password)?;

        let credentials = self.accounts.find_credentials(role, &email).await?;
        check_password(
            password,
            credentials.as_ref().map(|c| c.password_hash.as_str()),
        )?;

        let user_id = credentials.ok_or(AuthError::InvalidCredentials)?.id;
        Ok(self.open_session(role, user_id).await)
    }

    /// Login as a moderator of whatever kind the account has.
    ///
    /// # Errors
    ///
    /// Same as [`AuthService::login`].
    pub async fn login_moderator(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(LoginOutcome, ModeratorKind), AuthError> {
        let email = Email::parse(email)?;
        validate_password_length(password)?;

        let found = self.accounts.find_moderator_credentials(&email).await?;
        check_password(
            password,
            found.as_ref().map(|(c, _)| c.password_hash.as_str()),
        )?;

        let (credentials, kind) = found.ok_or(AuthError::InvalidCredentials)?;

        let outcome = self
            .open_session(Role::Moderator(kind), credentials.id)
            .await;
        Ok((outcome, kind))
    }

    /// End a session.
    pub async fn logout(&self, role: Role, token: SessionToken) {
        self.sessions.delete(role, token).await;
        tracing::info!(role = %role, "logged out");
    }

    async fn open_session(&self, role: Role, user_id: Uuid) -> LoginOutcome {
        let token = self.sessions.create(role, user_id).await;
        tracing::info!(role = %role, %user_id, "logged in");

        LoginOutcome {
            user_id,
            token,
            expires_in: self.sessions.ttl(),
        }
    }
}

/// Hash checked against when no account has the email.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("Dummy.Password.0").expect("Failed to hash dummy password"));

/// Verify a login password against the stored hash, if any.
///
/// An unknown email goes through the same Argon2 verification as a wrong
/// password, so response time does not tell whether the account exists.
fn check_password(password: &str, stored_hash: Option<&str>) -> Result<(), AuthError> {
    match stored_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            let _ = verify_password(password, &DUMMY_HASH);
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Validate a new account's password against the policy and hash it.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` naming the first rule violated.
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_new_password(password: &str) -> Result<String, AuthError> {
    validate_password(password)?;
    hash_password(password)
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the password doesn't match.
/// Returns `AuthError::PasswordHash` if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Correct.Horse.42").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Correct.Horse.42", &hash).is_ok());
        assert!(matches!(
            verify_password("Wrong.Horse.42", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("Correct.Horse.42").unwrap();
        let b = hash_password("Correct.Horse.42").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::PasswordHash)
        ));
    }

    #[test]
    fn test_unknown_email_runs_a_full_verification() {
        // A parsable Argon2id hash, so verification does the full work
        // instead of failing on the hash format.
        assert!(DUMMY_HASH.starts_with("$argon2id$"));
        assert!(PasswordHash::new(&DUMMY_HASH).is_ok());

        assert!(matches!(
            check_password("Correct.Horse.42", None),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            check_password("Dummy.Password.0", None),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_check_password_against_stored_hash() {
        let hash = hash_password("Correct.Horse.42").unwrap();
        assert!(check_password("Correct.Horse.42", Some(&hash)).is_ok());
        assert!(matches!(
            check_password("Wrong.Horse.42", Some(&hash)),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hash_new_password_enforces_policy() {
        assert!(matches!(
            hash_new_password("short"),
            Err(AuthError::WeakPassword(medico_core::PasswordError::InvalidLength))
        ));
        assert!(hash_new_password("Correct.Horse.42").is_ok());
    }
}
