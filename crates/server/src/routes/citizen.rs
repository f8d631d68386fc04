//! Citizen route handlers.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::Response,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use medico_core::{PrescriptionId, Role};

use super::{LoginRequest, login_response, logout_response};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireCitizen;
use crate::models::{AvailableBranch, Citizen, Doctor, MedicalInfo, Prescription};
use crate::services::{AuthService, CitizenService};
use crate::state::AppState;

/// Build the citizen router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
        .route("/medical_info", get(medical_info))
        .route("/personal_doctor", get(personal_doctor))
        .route("/prescriptions", get(prescriptions))
        .route("/available_pharmacies", get(available_pharmacies))
}

/// Query for `/available_pharmacies`.
#[derive(Debug, Deserialize)]
pub struct AvailablePharmaciesQuery {
    pub prescription_id: PrescriptionId,
}

/// Log in as a citizen.
#[instrument(skip_all)]
async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Result<Response> {
    let outcome = AuthService::new(state.pool(), state.sessions())
        .login(Role::Citizen, &body.email, &body.password)
        .await?;

    set_sentry_user(&outcome.user_id, Role::Citizen.namespace());
    Ok(login_response(&state, &outcome, None))
}

#[instrument(skip_all)]
async fn logout(State(state): State<AppState>, citizen: RequireCitizen) -> Response {
    AuthService::new(state.pool(), state.sessions())
        .logout(Role::Citizen, citizen.token)
        .await;

    clear_sentry_user();
    logout_response(&state, false)
}

#[instrument(skip_all, fields(citizen_id = %citizen.id))]
async fn session(State(state): State<AppState>, citizen: RequireCitizen) -> Result<Json<Citizen>> {
    Ok(Json(CitizenService::new(state.pool()).profile(citizen.id).await?))
}

#[instrument(skip_all, fields(citizen_id = %citizen.id))]
async fn medical_info(
    State(state): State<AppState>,
    citizen: RequireCitizen,
) -> Result<Json<MedicalInfo>> {
    Ok(Json(
        CitizenService::new(state.pool())
            .medical_info(citizen.id)
            .await?,
    ))
}

#[instrument(skip_all, fields(citizen_id = %citizen.id))]
async fn personal_doctor(
    State(state): State<AppState>,
    citizen: RequireCitizen,
) -> Result<Json<Doctor>> {
    Ok(Json(
        CitizenService::new(state.pool())
            .personal_doctor(citizen.id)
            .await?,
    ))
}

#[instrument(skip_all, fields(citizen_id = %citizen.id))]
async fn prescriptions(
    State(state): State<AppState>,
    citizen: RequireCitizen,
) -> Result<Json<Vec<Prescription>>> {
    Ok(Json(
        CitizenService::new(state.pool())
            .prescriptions(citizen.id)
            .await?,
    ))
}

/// Branches that can dispense a whole prescription right now.
#[instrument(skip_all, fields(citizen_id = %citizen.id, prescription_id = %query.prescription_id))]
async fn available_pharmacies(
    State(state): State<AppState>,
    citizen: RequireCitizen,
    Query(query): Query<AvailablePharmaciesQuery>,
) -> Result<Json<Vec<AvailableBranch>>> {
    let branches = CitizenService::new(state.pool())
        .available_pharmacies(citizen.id, query.prescription_id, Utc::now())
        .await?;
    Ok(Json(branches))
}
