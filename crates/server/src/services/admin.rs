//! Admin service: moderator account management.

use serde::Deserialize;
use sqlx::PgPool;

use medico_core::{AdminId, Email, ModeratorId, ModeratorKind, Role, validate_name};

use super::auth::{AuthError, hash_new_password};
use super::session::SessionStore;
use super::{PERSON_NAME_MAX, PERSON_NAME_MIN};
use crate::db::moderators::NewModerator;
use crate::db::{AccountRepository, ModeratorRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::models::{Admin, Moderator};

/// Request body for a new moderator.
#[derive(Debug, Deserialize)]
pub struct NewModeratorInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Admin service.
pub struct AdminService<'a> {
    accounts: AccountRepository<'a>,
    moderators: ModeratorRepository<'a>,
    sessions: &'a SessionStore,
}

impl<'a> AdminService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, sessions: &'a SessionStore) -> Self {
        Self {
            accounts: AccountRepository::new(pool),
            moderators: ModeratorRepository::new(pool),
            sessions,
        }
    }

    /// The logged-in admin's account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the account no longer exists.
    pub async fn profile(&self, id: AdminId) -> Result<Admin> {
        self.accounts
            .get_admin(id)
            .await?
            .ok_or_else(|| AuthError::SessionExpired.into())
    }

    /// All moderators.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn moderators(&self) -> Result<Vec<Moderator>> {
        Ok(self.moderators.list().await?)
    }

    /// Create a moderator account.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` on an unknown kind or bad name.
    /// Returns `AuthError` variants for a bad email or password, or a taken email.
    pub async fn create_moderator(&self, input: &NewModeratorInput) -> Result<Moderator> {
        let kind: ModeratorKind = input
            .kind
            .parse()
            .map_err(|e: medico_core::InvalidModeratorKind| AppError::BadRequest(e.to_string()))?;
        let first_name = validate_name(&input.first_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?;
        let last_name = validate_name(&input.last_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?;
        let email = Email::parse(&input.email)?;
        let password_hash = hash_new_password(&input.password)?;

        let moderator = self
            .moderators
            .create(NewModerator {
                first_name,
                last_name,
                kind,
                email: &email,
                password_hash: &password_hash,
            })
            .await
            .map_err(AuthError::from_create)?;

        tracing::info!(moderator_id = %moderator.id, kind = %kind, "moderator created");
        Ok(moderator)
    }

    /// Delete a moderator and end their sessions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no moderator has this ID.
    pub async fn delete_moderator(&self, id: ModeratorId) -> Result<()> {
        let kind = self.moderators.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("moderator does not exist".to_string()),
            other => other.into(),
        })?;

        self.sessions
            .revoke_user(Role::Moderator(kind), *id.as_uuid())
            .await;
        tracing::info!(moderator_id = %id, kind = %kind, "moderator deleted");
        Ok(())
    }
}
