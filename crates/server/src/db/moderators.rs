//! Moderator repository, used by admins to manage moderator accounts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use medico_core::{Email, ModeratorId, ModeratorKind, Role};

use super::accounts::insert_credentials;
use super::{RepositoryError, parse_email};
use crate::models::Moderator;

#[derive(Debug, sqlx::FromRow)]
struct ModeratorRow {
    id: ModeratorId,
    first_name: String,
    last_name: String,
    kind: ModeratorKind,
    email: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ModeratorRow> for Moderator {
    type Error = RepositoryError;

    fn try_from(row: ModeratorRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: parse_email(&row.email)?,
            kind: row.kind,
            created_at: row.created_at,
        })
    }
}

/// Fields of a new moderator.
#[derive(Debug)]
pub struct NewModerator<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub kind: ModeratorKind,
    pub email: &'a Email,
    pub password_hash: &'a str,
}

/// Repository for moderator accounts.
pub struct ModeratorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ModeratorRepository<'a> {
    /// Create a new moderator repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all moderators, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Moderator>, RepositoryError> {
        let rows = sqlx::query_as::<_, ModeratorRow>(
            r"
            SELECT m.id, m.first_name, m.last_name, m.kind, a.email, m.created_at
            FROM medico.moderator m
            JOIN medico.moderator_auth a ON a.id = m.id
            ORDER BY m.created_at DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a moderator by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ModeratorId) -> Result<Option<Moderator>, RepositoryError> {
        let row = sqlx::query_as::<_, ModeratorRow>(
            r"
            SELECT m.id, m.first_name, m.last_name, m.kind, a.email, m.created_at
            FROM medico.moderator m
            JOIN medico.moderator_auth a ON a.id = m.id
            WHERE m.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a moderator with its credentials.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(&self, new: NewModerator<'_>) -> Result<Moderator, RepositoryError> {
        let id = ModeratorId::generate();
        let mut tx = self.pool.begin().await?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r"
            INSERT INTO medico.moderator (id, first_name, last_name, kind)
            VALUES ($1, $2, $3, $4)
            RETURNING created_at
            ",
        )
        .bind(id)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.kind)
        .fetch_one(&mut *tx)
        .await?;

        insert_credentials(
            &mut *tx,
            Role::Moderator(new.kind),
            *id.as_uuid(),
            new.email,
            new.password_hash,
        )
        .await?;
        tx.commit().await?;

        Ok(Moderator {
            id,
            first_name: new.first_name.to_owned(),
            last_name: new.last_name.to_owned(),
            email: new.email.clone(),
            kind: new.kind,
            created_at,
        })
    }

    /// Delete a moderator, returning its kind.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no moderator has this ID.
    pub async fn delete(&self, id: ModeratorId) -> Result<ModeratorKind, RepositoryError> {
        sqlx::query_scalar::<_, ModeratorKind>(
            "DELETE FROM medico.moderator WHERE id = $1 RETURNING kind",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
