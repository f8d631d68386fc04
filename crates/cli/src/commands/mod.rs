//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;

/// Read the database URL the server also uses.
fn database_url() -> Result<SecretString, &'static str> {
    std::env::var("MEDICO_DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| "MEDICO_DATABASE_URL")
}
