//! Database operations for the Medico `PostgreSQL` schema.
//!
//! # Schema: `medico`
//!
//! ## Tables
//!
//! - `hospital` - Hospitals doctors can be attached to
//! - `doctor`, `citizen`, `pharmacy_owner`, `pharmacist`, `moderator`, `admin` - Profiles
//! - `*_auth` - Email and password hash per profile, sharing its primary key
//! - `medicament` - Registered medicaments
//! - `pharmacy_brand`, `pharmacy_branch` - Pharmacy chains and their branches
//! - `pharmacy_branch_storage` - Medicament stock per branch
//! - `prescription`, `prescription_medicament` - Prescriptions and line items
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p medico-cli -- migrate
//! ```

pub mod accounts;
pub mod citizens;
pub mod doctors;
pub mod medicaments;
pub mod moderators;
pub mod pharmacies;
pub mod prescriptions;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use medico_core::MedicamentId;

pub use accounts::AccountRepository;
pub use citizens::CitizenRepository;
pub use doctors::DoctorRepository;
pub use medicaments::MedicamentRepository;
pub use moderators::ModeratorRepository;
pub use pharmacies::PharmacyRepository;
pub use prescriptions::PrescriptionRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email) or an invalid state change.
    #[error("{0}")]
    Conflict(String),

    /// A branch does not hold enough of a medicament.
    #[error("insufficient stock of medicament {medicament_id}")]
    InsufficientStock { medicament_id: MedicamentId },
}

impl RepositoryError {
    /// Map unique and foreign key violations to [`RepositoryError::Conflict`].
    ///
    /// `unique` and `reference` are the messages reported for each kind of
    /// violation; any other error stays a database error.
    pub(crate) fn from_constraint(err: sqlx::Error, unique: &str, reference: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::Conflict(unique.to_owned());
            }
            if db_err.is_foreign_key_violation() {
                return Self::Conflict(reference.to_owned());
            }
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Turn a profile row's email column into an [`medico_core::Email`].
pub(crate) fn parse_email(raw: &str) -> Result<medico_core::Email, RepositoryError> {
    medico_core::Email::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_stay_database_errors() {
        let err = RepositoryError::from_constraint(sqlx::Error::RowNotFound, "dup", "missing");
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_parse_email_reports_corruption() {
        assert!(parse_email("doctor@clinic.bg").is_ok());
        assert!(matches!(
            parse_email("not-an-email"),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_conflict_display_is_the_message() {
        let err = RepositoryError::Conflict("email already exists".to_owned());
        assert_eq!(err.to_string(), "email already exists");
    }
}
