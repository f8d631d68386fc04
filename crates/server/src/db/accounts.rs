//! Credential lookups shared by every role, and admin accounts.
//!
//! Each role keeps its email and password hash in its own `*_auth` table,
//! keyed by the profile id. The same email may therefore belong to, say, a
//! doctor and a citizen without clashing.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use medico_core::{AdminId, Email, ModeratorKind, Role};

use super::{RepositoryError, parse_email};
use crate::models::{Admin, Credentials};

pub(crate) const EMAIL_TAKEN: &str = "an account with this email already exists";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    id: Uuid,
    password_hash: String,
}

impl From<CredentialsRow> for Credentials {
    fn from(row: CredentialsRow) -> Self {
        Self {
            id: row.id,
            password_hash: row.password_hash,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ModeratorCredentialsRow {
    id: Uuid,
    password_hash: String,
    kind: ModeratorKind,
}

#[derive(Debug, sqlx::FromRow)]
struct AdminRow {
    id: AdminId,
    name: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AdminRow> for Admin {
    type Error = RepositoryError;

    fn try_from(row: AdminRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: parse_email(&row.email)?,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Auth table plumbing
// =============================================================================

const fn select_credentials_sql(role: Role) -> &'static str {
    match role {
        Role::Admin => "SELECT id, password_hash FROM medico.admin_auth WHERE email = $1",
        Role::Citizen => "SELECT id, password_hash FROM medico.citizen_auth WHERE email = $1",
        Role::Doctor => "SELECT id, password_hash FROM medico.doctor_auth WHERE email = $1",
        Role::PharmacyOwner => {
            "SELECT id, password_hash FROM medico.pharmacy_owner_auth WHERE email = $1"
        }
        Role::Pharmacist => "SELECT id, password_hash FROM medico.pharmacist_auth WHERE email = $1",
        Role::Moderator(_) => {
            "SELECT a.id, a.password_hash
             FROM medico.moderator_auth a
             JOIN medico.moderator m ON m.id = a.id
             WHERE a.email = $1 AND m.kind = $2"
        }
    }
}

const fn insert_auth_sql(role: Role) -> &'static str {
    match role {
        Role::Admin => {
            "INSERT INTO medico.admin_auth (id, email, password_hash) VALUES ($1, $2, $3)"
        }
        Role::Citizen => {
            "INSERT INTO medico.citizen_auth (id, email, password_hash) VALUES ($1, $2, $3)"
        }
        Role::Doctor => {
            "INSERT INTO medico.doctor_auth (id, email, password_hash) VALUES ($1, $2, $3)"
        }
        Role::PharmacyOwner => {
            "INSERT INTO medico.pharmacy_owner_auth (id, email, password_hash) VALUES ($1, $2, $3)"
        }
        Role::Pharmacist => {
            "INSERT INTO medico.pharmacist_auth (id, email, password_hash) VALUES ($1, $2, $3)"
        }
        Role::Moderator(_) => {
            "INSERT INTO medico.moderator_auth (id, email, password_hash) VALUES ($1, $2, $3)"
        }
    }
}

/// Insert the credential twin of a freshly inserted profile row.
///
/// Runs on the caller's connection so it joins the caller's transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the email is already registered
/// for this role.
pub(crate) async fn insert_credentials(
    conn: &mut PgConnection,
    role: Role,
    id: Uuid,
    email: &Email,
    password_hash: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(insert_auth_sql(role))
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .execute(conn)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, EMAIL_TAKEN, "account profile is missing"))?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for credentials and admin accounts.
pub struct AccountRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up the credentials of an account of the given role.
    ///
    /// For moderators only accounts of the role's kind match.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_credentials(
        &self,
        role: Role,
        email: &Email,
    ) -> Result<Option<Credentials>, RepositoryError> {
        let query = sqlx::query_as::<_, CredentialsRow>(select_credentials_sql(role)).bind(email);
        let query = match role {
            Role::Moderator(kind) => query.bind(kind),
            _ => query,
        };

        let row = query.fetch_optional(self.pool).await?;
        Ok(row.map(Into::into))
    }

    /// Look up moderator credentials together with the moderator's kind.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_moderator_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(Credentials, ModeratorKind)>, RepositoryError> {
        let row = sqlx::query_as::<_, ModeratorCredentialsRow>(
            r"
            SELECT a.id, a.password_hash, m.kind
            FROM medico.moderator_auth a
            JOIN medico.moderator m ON m.id = a.id
            WHERE a.email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| {
            (
                Credentials {
                    id: r.id,
                    password_hash: r.password_hash,
                },
                r.kind,
            )
        }))
    }

    /// Get an admin by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_admin(&self, id: AdminId) -> Result<Option<Admin>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminRow>(
            r"
            SELECT p.id, p.name, a.email, p.created_at
            FROM medico.admin p
            JOIN medico.admin_auth a ON a.id = p.id
            WHERE p.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create an admin account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_admin(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<Admin, RepositoryError> {
        let id = AdminId::generate();
        let mut tx = self.pool.begin().await?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "INSERT INTO medico.admin (id, name) VALUES ($1, $2) RETURNING created_at",
        )
        .bind(id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        insert_credentials(&mut *tx, Role::Admin, *id.as_uuid(), email, password_hash).await?;
        tx.commit().await?;

        Ok(Admin {
            id,
            name: name.to_owned(),
            email: email.clone(),
            created_at,
        })
    }
}
