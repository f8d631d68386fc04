//! HTTP route handlers for the JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Liveness
//! GET  /health/ready                         - Readiness (database ping)
//!
//! # Admin
//! POST   /api/admin/login                    - Login
//! POST   /api/admin/logout                   - Logout
//! GET    /api/admin/session                  - Current admin
//! GET    /api/admin/moderators               - List moderators
//! POST   /api/admin/moderators               - Create moderator
//! DELETE /api/admin/moderators/{id}          - Delete moderator
//!
//! # Citizen
//! POST /api/citizen/login, /logout; GET /session
//! GET  /api/citizen/medical_info             - Height, weight, birth date
//! GET  /api/citizen/personal_doctor          - Personal doctor
//! GET  /api/citizen/prescriptions            - Own prescriptions
//! GET  /api/citizen/available_pharmacies?prescription_id=
//!
//! # Doctor
//! POST /api/doctor/login, /logout; GET /session
//! GET  /api/doctor/citizen?ucn=              - Citizen by UCN
//! GET  /api/doctor/citizens?ucn=             - Citizens by UCN prefix
//! GET  /api/doctor/citizen/{id}/prescriptions
//! POST /api/doctor/prescriptions             - Issue prescription
//! POST /api/doctor/prescriptions/{id}/invalidate
//! GET  /api/doctor/medicaments?name=         - Medicaments by name prefix
//!
//! # Pharmacy owner
//! POST /api/pharma/owner/login, /logout; GET /session
//! GET|POST /api/pharma/owner/branches
//! GET|POST /api/pharma/owner/pharmacists
//!
//! # Pharmacist
//! POST /api/pharma/pharmacist/login, /logout; GET /session
//! GET  /api/pharma/pharmacist/prescriptions?ucn=
//! POST /api/pharma/pharmacist/fulfill
//! POST /api/pharma/pharmacist/fulfill_medicaments
//! GET|POST /api/pharma/pharmacist/storage
//!
//! # Moderator
//! POST /api/moderator/login, /logout; GET /session
//! GET    /api/moderator/get_{entities}
//! GET    /api/moderator/get_{entity}/{id}
//! POST   /api/moderator/create_{entity}
//! PUT    /api/moderator/update_{entity}/{id}
//! DELETE /api/moderator/delete_{entity}/{id}
//! ```

pub mod admin;
pub mod citizen;
pub mod doctor;
pub mod moderator;
pub mod pharmacy;

use axum::{
    Json, Router,
    http::{StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medico_core::ModeratorKind;

use crate::middleware::{login_cookies, logout_cookies};
use crate::services::auth::LoginOutcome;
use crate::state::AppState;

/// Build the API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/admin", admin::router())
        .nest("/api/citizen", citizen::router())
        .nest("/api/doctor", doctor::router())
        .nest("/api/pharma/owner", pharmacy::owner_router())
        .nest("/api/pharma/pharmacist", pharmacy::pharmacist_router())
        .nest("/api/moderator", moderator::router())
}

// =============================================================================
// Shared Types
// =============================================================================

/// Login request body, shared by every role.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response body.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id: Uuid,
    /// Session lifetime in seconds.
    pub expires_in: u64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub moderator_type: Option<ModeratorKind>,
}

/// Respond to a successful login with the session cookies set.
fn login_response(
    state: &AppState,
    outcome: &LoginOutcome,
    moderator: Option<ModeratorKind>,
) -> Response {
    let body = LoginResponse {
        id: outcome.user_id,
        expires_in: outcome.expires_in.as_secs(),
        moderator_type: moderator,
    };

    let mut response = Json(body).into_response();
    for cookie in login_cookies(&state.config().session, outcome.token, moderator) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

/// Respond to a logout, expiring the session cookies.
fn logout_response(state: &AppState, moderator: bool) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    for cookie in logout_cookies(&state.config().session, moderator) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

/// Respond with a freshly created resource.
fn created<T: Serialize>(value: T) -> Response {
    (StatusCode::CREATED, Json(value)).into_response()
}
