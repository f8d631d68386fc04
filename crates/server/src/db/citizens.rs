//! Citizen repository.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use medico_core::{CitizenId, DoctorId, Email, Role, Ucn};

use super::accounts::{EMAIL_TAKEN, insert_credentials};
use super::{RepositoryError, parse_email};
use crate::models::{Citizen, CitizenSummary};

/// Maximum rows returned by a UCN prefix search.
pub const UCN_SEARCH_LIMIT: i64 = 7;

const UCN_TAKEN: &str = "a citizen with this ucn already exists";
const DOCTOR_MISSING: &str = "personal doctor does not exist";

const SELECT_CITIZEN: &str = r"
    SELECT c.id, c.first_name, c.second_name, c.last_name, c.ucn, c.birth_date,
           c.height_cm, c.weight_kg, c.address, c.city, a.email,
           c.personal_doctor_id, c.created_at
    FROM medico.citizen c
    JOIN medico.citizen_auth a ON a.id = c.id
";

#[derive(Debug, sqlx::FromRow)]
struct CitizenRow {
    id: CitizenId,
    first_name: String,
    second_name: String,
    last_name: String,
    ucn: Ucn,
    birth_date: NaiveDate,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    address: String,
    city: String,
    email: String,
    personal_doctor_id: Option<DoctorId>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CitizenRow> for Citizen {
    type Error = RepositoryError;

    fn try_from(row: CitizenRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            second_name: row.second_name,
            last_name: row.last_name,
            ucn: row.ucn,
            birth_date: row.birth_date,
            height_cm: row.height_cm,
            weight_kg: row.weight_kg,
            address: row.address,
            city: row.city,
            email: parse_email(&row.email)?,
            personal_doctor_id: row.personal_doctor_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CitizenSummaryRow {
    id: CitizenId,
    first_name: String,
    last_name: String,
    ucn: Ucn,
}

impl From<CitizenSummaryRow> for CitizenSummary {
    fn from(row: CitizenSummaryRow) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            ucn: row.ucn,
        }
    }
}

/// Profile fields of a citizen, used for both create and update.
#[derive(Debug)]
pub struct CitizenFields<'a> {
    pub first_name: &'a str,
    pub second_name: &'a str,
    pub last_name: &'a str,
    pub ucn: &'a Ucn,
    pub birth_date: NaiveDate,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub address: &'a str,
    pub city: &'a str,
    pub email: &'a Email,
    pub personal_doctor_id: Option<DoctorId>,
}

/// Repository for citizens.
pub struct CitizenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CitizenRepository<'a> {
    /// Create a new citizen repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all citizens ordered by UCN.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Citizen>, RepositoryError> {
        let sql = format!("{SELECT_CITIZEN} ORDER BY c.ucn");
        let rows = sqlx::query_as::<_, CitizenRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a citizen by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CitizenId) -> Result<Option<Citizen>, RepositoryError> {
        let sql = format!("{SELECT_CITIZEN} WHERE c.id = $1");
        let row = sqlx::query_as::<_, CitizenRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a citizen by UCN.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_ucn(&self, ucn: &Ucn) -> Result<Option<Citizen>, RepositoryError> {
        let sql = format!("{SELECT_CITIZEN} WHERE c.ucn = $1");
        let row = sqlx::query_as::<_, CitizenRow>(&sql)
            .bind(ucn)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Citizens whose UCN starts with `prefix`, at most [`UCN_SEARCH_LIMIT`].
    ///
    /// The prefix must already be validated as digits only.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search_by_ucn_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<CitizenSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, CitizenSummaryRow>(
            r"
            SELECT id, first_name, last_name, ucn
            FROM medico.citizen
            WHERE ucn LIKE $1 || '%'
            ORDER BY ucn
            LIMIT $2
            ",
        )
        .bind(prefix)
        .bind(UCN_SEARCH_LIMIT)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a citizen with its credentials.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the UCN or email is taken or
    /// the personal doctor does not exist.
    pub async fn create(
        &self,
        fields: &CitizenFields<'_>,
        password_hash: &str,
    ) -> Result<Citizen, RepositoryError> {
        let id = CitizenId::generate();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO medico.citizen (
                id, first_name, second_name, last_name, ucn, birth_date,
                height_cm, weight_kg, address, city, personal_doctor_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(id)
        .bind(fields.first_name)
        .bind(fields.second_name)
        .bind(fields.last_name)
        .bind(fields.ucn)
        .bind(fields.birth_date)
        .bind(fields.height_cm)
        .bind(fields.weight_kg)
        .bind(fields.address)
        .bind(fields.city)
        .bind(fields.personal_doctor_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, UCN_TAKEN, DOCTOR_MISSING))?;

        insert_credentials(&mut *tx, Role::Citizen, *id.as_uuid(), fields.email, password_hash)
            .await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Update a citizen's profile and email, and the password when given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no citizen has this ID.
    /// Returns `RepositoryError::Conflict` on a taken UCN or email.
    pub async fn update(
        &self,
        id: CitizenId,
        fields: &CitizenFields<'_>,
        password_hash: Option<&str>,
    ) -> Result<Citizen, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE medico.citizen
            SET first_name = $2, second_name = $3, last_name = $4, ucn = $5,
                birth_date = $6, height_cm = $7, weight_kg = $8, address = $9,
                city = $10, personal_doctor_id = $11, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(fields.first_name)
        .bind(fields.second_name)
        .bind(fields.last_name)
        .bind(fields.ucn)
        .bind(fields.birth_date)
        .bind(fields.height_cm)
        .bind(fields.weight_kg)
        .bind(fields.address)
        .bind(fields.city)
        .bind(fields.personal_doctor_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, UCN_TAKEN, DOCTOR_MISSING))?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            r"
            UPDATE medico.citizen_auth
            SET email = $2, password_hash = COALESCE($3, password_hash)
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(fields.email)
        .bind(password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, EMAIL_TAKEN, "citizen does not exist"))?;

        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a citizen together with their prescriptions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no citizen has this ID.
    pub async fn delete(&self, id: CitizenId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM medico.citizen WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
