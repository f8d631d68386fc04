//! Medicament repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use medico_core::{AtcCode, MedicamentId};

use super::RepositoryError;
use crate::models::{Medicament, MedicamentSummary};

/// Maximum rows returned by a name prefix search.
pub const NAME_SEARCH_LIMIT: i64 = 7;

const SELECT_MEDICAMENT: &str = r"
    SELECT id, official_name, active_ingredients, atc, requires_prescription, created_at
    FROM medico.medicament
";

#[derive(Debug, sqlx::FromRow)]
struct MedicamentRow {
    id: MedicamentId,
    official_name: String,
    active_ingredients: Vec<String>,
    atc: AtcCode,
    requires_prescription: bool,
    created_at: DateTime<Utc>,
}

impl From<MedicamentRow> for Medicament {
    fn from(row: MedicamentRow) -> Self {
        Self {
            id: row.id,
            official_name: row.official_name,
            active_ingredients: row.active_ingredients,
            atc: row.atc,
            requires_prescription: row.requires_prescription,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MedicamentSummaryRow {
    id: MedicamentId,
    official_name: String,
}

/// Fields of a medicament, used for both create and update.
#[derive(Debug)]
pub struct MedicamentFields<'a> {
    pub official_name: &'a str,
    pub active_ingredients: &'a [String],
    pub atc: &'a AtcCode,
    pub requires_prescription: bool,
}

/// Escape `LIKE` wildcards so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for medicaments.
pub struct MedicamentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MedicamentRepository<'a> {
    /// Create a new medicament repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all medicaments ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Medicament>, RepositoryError> {
        let sql = format!("{SELECT_MEDICAMENT} ORDER BY official_name");
        let rows = sqlx::query_as::<_, MedicamentRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a medicament by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: MedicamentId) -> Result<Option<Medicament>, RepositoryError> {
        let sql = format!("{SELECT_MEDICAMENT} WHERE id = $1");
        let row = sqlx::query_as::<_, MedicamentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Medicaments whose name starts with `prefix`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search_by_name(
        &self,
        prefix: &str,
    ) -> Result<Vec<MedicamentSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, MedicamentSummaryRow>(
            r"
            SELECT id, official_name
            FROM medico.medicament
            WHERE lower(official_name) LIKE lower($1) || '%'
            ORDER BY official_name
            LIMIT $2
            ",
        )
        .bind(escape_like(prefix))
        .bind(NAME_SEARCH_LIMIT)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| MedicamentSummary {
                id: r.id,
                official_name: r.official_name,
            })
            .collect())
    }

    /// Which of `ids` exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn existing(&self, ids: &[MedicamentId]) -> Result<Vec<MedicamentId>, RepositoryError> {
        let found = sqlx::query_scalar::<_, MedicamentId>(
            "SELECT id FROM medico.medicament WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(found)
    }

    /// Create a medicament.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, fields: &MedicamentFields<'_>) -> Result<Medicament, RepositoryError> {
        let row = sqlx::query_as::<_, MedicamentRow>(
            r"
            INSERT INTO medico.medicament (id, official_name, active_ingredients, atc, requires_prescription)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, official_name, active_ingredients, atc, requires_prescription, created_at
            ",
        )
        .bind(MedicamentId::generate())
        .bind(fields.official_name)
        .bind(fields.active_ingredients)
        .bind(fields.atc)
        .bind(fields.requires_prescription)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Update a medicament.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no medicament has this ID.
    pub async fn update(
        &self,
        id: MedicamentId,
        fields: &MedicamentFields<'_>,
    ) -> Result<Medicament, RepositoryError> {
        let row = sqlx::query_as::<_, MedicamentRow>(
            r"
            UPDATE medico.medicament
            SET official_name = $2, active_ingredients = $3, atc = $4,
                requires_prescription = $5, updated_at = now()
            WHERE id = $1
            RETURNING id, official_name, active_ingredients, atc, requires_prescription, created_at
            ",
        )
        .bind(id)
        .bind(fields.official_name)
        .bind(fields.active_ingredients)
        .bind(fields.atc)
        .bind(fields.requires_prescription)
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a medicament and every branch's stock of it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no medicament has this ID.
    /// Returns `RepositoryError::Conflict` if a prescription lists it.
    pub async fn delete(&self, id: MedicamentId) -> Result<(), RepositoryError> {
        const IN_USE: &str = "medicament is listed on prescriptions and cannot be deleted";

        let result = sqlx::query("DELETE FROM medico.medicament WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, IN_USE, IN_USE))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
