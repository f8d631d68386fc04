//! Business logic between route handlers and repositories.

pub mod admin;
pub mod auth;
pub mod citizen;
pub mod doctor;
pub mod moderator;
pub mod pharmacy;
pub mod session;

pub use admin::AdminService;
pub use auth::{AuthError, AuthService};
pub use citizen::CitizenService;
pub use doctor::DoctorService;
pub use moderator::ModeratorService;
pub use pharmacy::PharmacyService;
pub use session::{SessionStore, SessionToken};

/// Length bounds for people's names.
const PERSON_NAME_MIN: usize = 2;
const PERSON_NAME_MAX: usize = 50;

/// Length bounds for pharmacy, branch and city names.
const PLACE_NAME_MIN: usize = 2;
const PLACE_NAME_MAX: usize = 64;

const ADDRESS_MAX: usize = 128;
