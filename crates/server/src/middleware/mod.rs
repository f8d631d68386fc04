//! HTTP middleware for the API.
//!
//! Sessions are not a tower layer: each protected handler takes one of the
//! role extractors from [`auth`], which resolves the session cookie against
//! the in-memory [`SessionStore`](crate::services::session::SessionStore).

pub mod auth;
pub mod session;

pub use auth::{
    RequireAdmin, RequireCitizen, RequireDoctor, RequireModerator, RequirePharmacist,
    RequirePharmacyOwner,
};
pub use session::{MODERATOR_TYPE_COOKIE, login_cookies, logout_cookies, read_cookie};
