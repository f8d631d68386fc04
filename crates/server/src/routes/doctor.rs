//! Doctor route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use medico_core::{CitizenId, PrescriptionId, Role};

use super::{LoginRequest, created, login_response, logout_response};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireDoctor;
use crate::models::{Citizen, CitizenSummary, Doctor, MedicamentSummary, Prescription};
use crate::services::doctor::NewPrescriptionInput;
use crate::services::{AuthService, DoctorService};
use crate::state::AppState;

/// Build the doctor router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
        .route("/citizen", get(citizen_by_ucn))
        .route("/citizens", get(citizens_by_ucn_prefix))
        .route("/citizen/{id}/prescriptions", get(citizen_prescriptions))
        .route("/prescriptions", post(create_prescription))
        .route("/prescriptions/{id}/invalidate", post(invalidate_prescription))
        .route("/medicaments", get(medicaments_by_name))
}

/// Query carrying a full UCN or a UCN prefix.
#[derive(Debug, Deserialize)]
pub struct UcnQuery {
    pub ucn: String,
}

/// Query carrying a medicament name prefix.
#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

/// Log in as a doctor.
#[instrument(skip_all)]
async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Result<Response> {
    let outcome = AuthService::new(state.pool(), state.sessions())
        .login(Role::Doctor, &body.email, &body.password)
        .await?;

    set_sentry_user(&outcome.user_id, Role::Doctor.namespace());
    Ok(login_response(&state, &outcome, None))
}

#[instrument(skip_all)]
async fn logout(State(state): State<AppState>, doctor: RequireDoctor) -> Response {
    AuthService::new(state.pool(), state.sessions())
        .logout(Role::Doctor, doctor.token)
        .await;

    clear_sentry_user();
    logout_response(&state, false)
}

#[instrument(skip_all, fields(doctor_id = %doctor.id))]
async fn session(State(state): State<AppState>, doctor: RequireDoctor) -> Result<Json<Doctor>> {
    Ok(Json(DoctorService::new(state.pool()).profile(doctor.id).await?))
}

#[instrument(skip_all, fields(doctor_id = %doctor.id))]
async fn citizen_by_ucn(
    State(state): State<AppState>,
    doctor: RequireDoctor,
    Query(query): Query<UcnQuery>,
) -> Result<Json<Citizen>> {
    Ok(Json(
        DoctorService::new(state.pool())
            .citizen_by_ucn(&query.ucn)
            .await?,
    ))
}

/// Autocomplete citizens by UCN prefix.
#[instrument(skip_all, fields(doctor_id = %doctor.id))]
async fn citizens_by_ucn_prefix(
    State(state): State<AppState>,
    doctor: RequireDoctor,
    Query(query): Query<UcnQuery>,
) -> Result<Json<Vec<CitizenSummary>>> {
    Ok(Json(
        DoctorService::new(state.pool())
            .citizens_by_ucn_prefix(&query.ucn)
            .await?,
    ))
}

#[instrument(skip(state, doctor), fields(doctor_id = %doctor.id))]
async fn citizen_prescriptions(
    State(state): State<AppState>,
    doctor: RequireDoctor,
    Path(id): Path<CitizenId>,
) -> Result<Json<Vec<Prescription>>> {
    Ok(Json(
        DoctorService::new(state.pool())
            .citizen_prescriptions(id)
            .await?,
    ))
}

#[instrument(skip_all, fields(doctor_id = %doctor.id, citizen_id = %body.citizen_id))]
async fn create_prescription(
    State(state): State<AppState>,
    doctor: RequireDoctor,
    Json(body): Json<NewPrescriptionInput>,
) -> Result<Response> {
    let prescription = DoctorService::new(state.pool())
        .create_prescription(doctor.id, &body, Utc::now())
        .await?;
    Ok(created(prescription))
}

#[instrument(skip(state, doctor), fields(doctor_id = %doctor.id))]
async fn invalidate_prescription(
    State(state): State<AppState>,
    doctor: RequireDoctor,
    Path(id): Path<PrescriptionId>,
) -> Result<Json<Prescription>> {
    Ok(Json(
        DoctorService::new(state.pool())
            .invalidate_prescription(doctor.id, id)
            .await?,
    ))
}

/// Autocomplete medicaments by name prefix.
#[instrument(skip_all, fields(doctor_id = %doctor.id, name = %query.name))]
async fn medicaments_by_name(
    State(state): State<AppState>,
    doctor: RequireDoctor,
    Query(query): Query<NameQuery>,
) -> Result<Json<Vec<MedicamentSummary>>> {
    Ok(Json(
        DoctorService::new(state.pool())
            .medicaments_by_name(&query.name)
            .await?,
    ))
}
