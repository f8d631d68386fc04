//! Admin account management commands.
//!
//! # Usage
//!
//! ```bash
//! MEDICO_ADMIN_PASSWORD='...' medico-cli admin create -e admin@example.com -n "Admin Name"
//! ```
//!
//! # Environment Variables
//!
//! - `MEDICO_DATABASE_URL` - `PostgreSQL` connection string
//! - `MEDICO_ADMIN_PASSWORD` - Password for the new admin

use medico_core::{AdminId, Email, EmailError};
use medico_server::db::{self, AccountRepository, RepositoryError};
use medico_server::services::auth::{AuthError, hash_new_password};
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password rejected or hashing failed.
    #[error("{0}")]
    Password(#[from] AuthError),

    /// Admin already exists.
    #[error("Admin already exists with email: {0}")]
    UserExists(String),

    /// Any other repository failure.
    #[error("{0}")]
    Repository(RepositoryError),
}

/// Create a new admin account.
///
/// # Arguments
///
/// * `email` - Admin's email address
/// * `name` - Admin's display name
///
/// # Returns
///
/// The ID of the created admin.
///
/// # Errors
///
/// Returns `AdminError` if the password is missing or too weak, the email
/// is invalid or already taken, or the database is unreachable.
pub async fn create_user(email: &str, name: &str) -> Result<AdminId, AdminError> {
    dotenvy::dotenv().ok();

    let email = Email::parse(email)?;
    let password = std::env::var("MEDICO_ADMIN_PASSWORD")
        .map_err(|_| AdminError::MissingEnvVar("MEDICO_ADMIN_PASSWORD"))?;
    let password_hash = hash_new_password(&password)?;

    let database_url = super::database_url().map_err(AdminError::MissingEnvVar)?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Creating admin: {}", email);

    let admin = AccountRepository::new(&pool)
        .create_admin(name.trim(), &email, &password_hash)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!("Admin created successfully! ID: {}, Email: {}", admin.id, email);

    Ok(admin.id)
}
