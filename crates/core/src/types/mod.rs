//! Domain types for Medico.
//!
//! Validated newtypes and enums shared by the server, the CLI and tests.

pub mod civil;
pub mod email;
pub mod id;
pub mod password;
pub mod role;

pub use civil::{AtcCode, CivilError, Coordinates, Ucn, Uin, validate_name};
pub use email::{Email, EmailError};
pub use id::*;
pub use password::{
    MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH, PasswordError, validate_password,
    validate_password_length,
};
pub use role::{InvalidModeratorKind, ModeratorKind, PrescriptionState, Role};
