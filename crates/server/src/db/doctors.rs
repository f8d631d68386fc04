//! Doctor and hospital repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use medico_core::{DoctorId, Email, HospitalId, Role, Uin};

use super::accounts::{EMAIL_TAKEN, insert_credentials};
use super::{RepositoryError, parse_email};
use crate::models::{Doctor, Hospital};

const UIN_TAKEN: &str = "a doctor with this uin already exists";

const SELECT_DOCTOR: &str = r"
    SELECT d.id, d.first_name, d.second_name, d.last_name, d.uin, a.email,
           d.hospital_id, h.name AS hospital, d.created_at
    FROM medico.doctor d
    JOIN medico.doctor_auth a ON a.id = d.id
    LEFT JOIN medico.hospital h ON h.id = d.hospital_id
";

#[derive(Debug, sqlx::FromRow)]
struct DoctorRow {
    id: DoctorId,
    first_name: String,
    second_name: String,
    last_name: String,
    uin: Uin,
    email: String,
    hospital_id: Option<HospitalId>,
    hospital: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DoctorRow> for Doctor {
    type Error = RepositoryError;

    fn try_from(row: DoctorRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            second_name: row.second_name,
            last_name: row.last_name,
            uin: row.uin,
            email: parse_email(&row.email)?,
            hospital_id: row.hospital_id,
            hospital: row.hospital,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HospitalRow {
    id: HospitalId,
    name: String,
    city: String,
    address: String,
}

impl From<HospitalRow> for Hospital {
    fn from(row: HospitalRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            city: row.city,
            address: row.address,
        }
    }
}

/// Profile fields of a doctor, used for both create and update.
#[derive(Debug)]
pub struct DoctorFields<'a> {
    pub first_name: &'a str,
    pub second_name: &'a str,
    pub last_name: &'a str,
    pub uin: &'a Uin,
    pub email: &'a Email,
    pub hospital_id: Option<HospitalId>,
}

/// Repository for doctors and hospitals.
pub struct DoctorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DoctorRepository<'a> {
    /// Create a new doctor repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all doctors ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Doctor>, RepositoryError> {
        let sql = format!("{SELECT_DOCTOR} ORDER BY d.last_name, d.first_name");
        let rows = sqlx::query_as::<_, DoctorRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a doctor by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DoctorId) -> Result<Option<Doctor>, RepositoryError> {
        let sql = format!("{SELECT_DOCTOR} WHERE d.id = $1");
        let row = sqlx::query_as::<_, DoctorRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a doctor with its credentials.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the UIN or email is taken or the
    /// hospital does not exist.
    pub async fn create(
        &self,
        fields: &DoctorFields<'_>,
        password_hash: &str,
    ) -> Result<Doctor, RepositoryError> {
        let id = DoctorId::generate();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO medico.doctor (id, first_name, second_name, last_name, uin, hospital_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(id)
        .bind(fields.first_name)
        .bind(fields.second_name)
        .bind(fields.last_name)
        .bind(fields.uin)
        .bind(fields.hospital_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(e, UIN_TAKEN, "hospital does not exist")
        })?;

        insert_credentials(&mut *tx, Role::Doctor, *id.as_uuid(), fields.email, password_hash)
            .await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Update a doctor's profile and email, and the password when given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no doctor has this ID.
    /// Returns `RepositoryError::Conflict` on a taken UIN or email.
    pub async fn update(
        &self,
        id: DoctorId,
        fields: &DoctorFields<'_>,
        password_hash: Option<&str>,
    ) -> Result<Doctor, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE medico.doctor
            SET first_name = $2, second_name = $3, last_name = $4, uin = $5,
                hospital_id = $6, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(fields.first_name)
        .bind(fields.second_name)
        .bind(fields.last_name)
        .bind(fields.uin)
        .bind(fields.hospital_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(e, UIN_TAKEN, "hospital does not exist")
        })?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            r"
            UPDATE medico.doctor_auth
            SET email = $2, password_hash = COALESCE($3, password_hash)
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(fields.email)
        .bind(password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, EMAIL_TAKEN, "doctor does not exist"))?;

        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a doctor.
    ///
    /// Citizens who had the doctor as personal doctor are left without one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no doctor has this ID.
    /// Returns `RepositoryError::Conflict` if the doctor issued prescriptions.
    pub async fn delete(&self, id: DoctorId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM medico.doctor WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                const IN_USE: &str = "doctor has issued prescriptions and cannot be deleted";
                RepositoryError::from_constraint(e, IN_USE, IN_USE)
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// List all hospitals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_hospitals(&self) -> Result<Vec<Hospital>, RepositoryError> {
        let rows = sqlx::query_as::<_, HospitalRow>(
            "SELECT id, name, city, address FROM medico.hospital ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a hospital.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_hospital(
        &self,
        name: &str,
        city: &str,
        address: &str,
    ) -> Result<Hospital, RepositoryError> {
        let row = sqlx::query_as::<_, HospitalRow>(
            r"
            INSERT INTO medico.hospital (id, name, city, address)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, city, address
            ",
        )
        .bind(HospitalId::generate())
        .bind(name)
        .bind(city)
        .bind(address)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
