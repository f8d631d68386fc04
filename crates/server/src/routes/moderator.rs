//! Moderator route handlers.
//!
//! Every entity endpoint sits behind [`RequireModerator`], which rejects
//! moderators whose kind does not match the entity in the path.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post, put},
};
use serde::Serialize;
use tracing::instrument;

use medico_core::{
    CitizenId, DoctorId, MedicamentId, ModeratorId, ModeratorKind, PharmacyBrandId, Role,
};

use super::{LoginRequest, created, login_response, logout_response};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireModerator;
use crate::models::{Citizen, Doctor, Medicament, PharmacyBrand};
use crate::services::moderator::{CitizenInput, DoctorInput, MedicamentInput, PharmacyInput};
use crate::services::{AuthService, ModeratorService};
use crate::state::AppState;

/// Build the moderator router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
        // Doctors
        .route("/get_doctors", get(get_doctors))
        .route("/get_doctor/{id}", get(get_doctor))
        .route("/create_doctor", post(create_doctor))
        .route("/update_doctor/{id}", put(update_doctor))
        .route("/delete_doctor/{id}", delete(delete_doctor))
        // Citizens
        .route("/get_citizens", get(get_citizens))
        .route("/get_citizen/{id}", get(get_citizen))
        .route("/create_citizen", post(create_citizen))
        .route("/update_citizen/{id}", put(update_citizen))
        .route("/delete_citizen/{id}", delete(delete_citizen))
        // Medicaments
        .route("/get_medicaments", get(get_medicaments))
        .route("/get_medicament/{id}", get(get_medicament))
        .route("/create_medicament", post(create_medicament))
        .route("/update_medicament/{id}", put(update_medicament))
        .route("/delete_medicament/{id}", delete(delete_medicament))
        // Pharmacies
        .route("/get_pharmacies", get(get_pharmacies))
        .route("/get_pharmacy/{id}", get(get_pharmacy))
        .route("/create_pharmacy", post(create_pharmacy))
        .route("/update_pharmacy/{id}", put(update_pharmacy))
        .route("/delete_pharmacy/{id}", delete(delete_pharmacy))
}

/// Session response body.
#[derive(Debug, Serialize)]
pub struct ModeratorSession {
    pub id: ModeratorId,
    #[serde(rename = "type")]
    pub kind: ModeratorKind,
}

// =============================================================================
// Session
// =============================================================================

/// Log in as a moderator; the response carries the moderator's kind.
#[instrument(skip_all)]
async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Result<Response> {
    let (outcome, kind) = AuthService::new(state.pool(), state.sessions())
        .login_moderator(&body.email, &body.password)
        .await?;

    set_sentry_user(&outcome.user_id, Role::Moderator(kind).namespace());
    Ok(login_response(&state, &outcome, Some(kind)))
}

#[instrument(skip_all)]
async fn logout(State(state): State<AppState>, moderator: RequireModerator) -> Response {
    AuthService::new(state.pool(), state.sessions())
        .logout(Role::Moderator(moderator.kind), moderator.token)
        .await;

    clear_sentry_user();
    logout_response(&state, true)
}

async fn session(moderator: RequireModerator) -> Json<ModeratorSession> {
    Json(ModeratorSession {
        id: moderator.id,
        kind: moderator.kind,
    })
}

// =============================================================================
// Doctors
// =============================================================================

#[instrument(skip_all, fields(moderator_id = %moderator.id))]
async fn get_doctors(
    State(state): State<AppState>,
    moderator: RequireModerator,
) -> Result<Json<Vec<Doctor>>> {
    let doctors = ModeratorService::new(state.pool(), state.sessions())
        .doctors()
        .await?;
    Ok(Json(doctors))
}

#[instrument(skip(state, moderator), fields(moderator_id = %moderator.id))]
async fn get_doctor(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<DoctorId>,
) -> Result<Json<Doctor>> {
    let doctor = ModeratorService::new(state.pool(), state.sessions())
        .doctor(id)
        .await?;
    Ok(Json(doctor))
}

#[instrument(skip_all, fields(moderator_id = %moderator.id))]
async fn create_doctor(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Json(body): Json<DoctorInput>,
) -> Result<Response> {
    let doctor = ModeratorService::new(state.pool(), state.sessions())
        .create_doctor(&body)
        .await?;
    Ok(created(doctor))
}

#[instrument(skip(state, moderator, body), fields(moderator_id = %moderator.id))]
async fn update_doctor(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<DoctorId>,
    Json(body): Json<DoctorInput>,
) -> Result<Json<Doctor>> {
    let doctor = ModeratorService::new(state.pool(), state.sessions())
        .update_doctor(id, &body)
        .await?;
    Ok(Json(doctor))
}

#[instrument(skip(state, moderator), fields(moderator_id = %moderator.id))]
async fn delete_doctor(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<DoctorId>,
) -> Result<StatusCode> {
    ModeratorService::new(state.pool(), state.sessions())
        .delete_doctor(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Citizens
// =============================================================================

#[instrument(skip_all, fields(moderator_id = %moderator.id))]
async fn get_citizens(
    State(state): State<AppState>,
    moderator: RequireModerator,
) -> Result<Json<Vec<Citizen>>> {
    let citizens = ModeratorService::new(state.pool(), state.sessions())
        .citizens()
        .await?;
    Ok(Json(citizens))
}

#[instrument(skip(state, moderator), fields(moderator_id = %moderator.id))]
async fn get_citizen(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<CitizenId>,
) -> Result<Json<Citizen>> {
    let citizen = ModeratorService::new(state.pool(), state.sessions())
        .citizen(id)
        .await?;
    Ok(Json(citizen))
}

#[instrument(skip_all, fields(moderator_id = %moderator.id))]
async fn create_citizen(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Json(body): Json<CitizenInput>,
) -> Result<Response> {
    let citizen = ModeratorService::new(state.pool(), state.sessions())
        .create_citizen(&body)
        .await?;
    Ok(created(citizen))
}

#[instrument(skip(state, moderator, body), fields(moderator_id = %moderator.id))]
async fn update_citizen(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<CitizenId>,
    Json(body): Json<CitizenInput>,
) -> Result<Json<Citizen>> {
    let citizen = ModeratorService::new(state.pool(), state.sessions())
        .update_citizen(id, &body)
        .await?;
    Ok(Json(citizen))
}

#[instrument(skip(state, moderator), fields(moderator_id = %moderator.id))]
async fn delete_citizen(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<CitizenId>,
) -> Result<StatusCode> {
    ModeratorService::new(state.pool(), state.sessions())
        .delete_citizen(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Medicaments
// =============================================================================

#[instrument(skip_all, fields(moderator_id = %moderator.id))]
async fn get_medicaments(
    State(state): State<AppState>,
    moderator: RequireModerator,
) -> Result<Json<Vec<Medicament>>> {
    let medicaments = ModeratorService::new(state.pool(), state.sessions())
        .medicaments()
        .await?;
    Ok(Json(medicaments))
}

#[instrument(skip(state, moderator), fields(moderator_id = %moderator.id))]
async fn get_medicament(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<MedicamentId>,
) -> Result<Json<Medicament>> {
    let medicament = ModeratorService::new(state.pool(), state.sessions())
        .medicament(id)
        .await?;
    Ok(Json(medicament))
}

#[instrument(skip_all, fields(moderator_id = %moderator.id))]
async fn create_medicament(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Json(body): Json<MedicamentInput>,
) -> Result<Response> {
    let medicament = ModeratorService::new(state.pool(), state.sessions())
        .create_medicament(&body)
        .await?;
    Ok(created(medicament))
}

#[instrument(skip(state, moderator, body), fields(moderator_id = %moderator.id))]
async fn update_medicament(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<MedicamentId>,
    Json(body): Json<MedicamentInput>,
) -> Result<Json<Medicament>> {
    let medicament = ModeratorService::new(state.pool(), state.sessions())
        .update_medicament(id, &body)
        .await?;
    Ok(Json(medicament))
}

#[instrument(skip(state, moderator), fields(moderator_id = %moderator.id))]
async fn delete_medicament(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<MedicamentId>,
) -> Result<StatusCode> {
    ModeratorService::new(state.pool(), state.sessions())
        .delete_medicament(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Pharmacies
// =============================================================================

#[instrument(skip_all, fields(moderator_id = %moderator.id))]
async fn get_pharmacies(
    State(state): State<AppState>,
    moderator: RequireModerator,
) -> Result<Json<Vec<PharmacyBrand>>> {
    let pharmacies = ModeratorService::new(state.pool(), state.sessions())
        .pharmacies()
        .await?;
    Ok(Json(pharmacies))
}

#[instrument(skip(state, moderator), fields(moderator_id = %moderator.id))]
async fn get_pharmacy(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<PharmacyBrandId>,
) -> Result<Json<PharmacyBrand>> {
    let pharmacy = ModeratorService::new(state.pool(), state.sessions())
        .pharmacy(id)
        .await?;
    Ok(Json(pharmacy))
}

/// Create a pharmacy brand together with its owner account.
#[instrument(skip_all, fields(moderator_id = %moderator.id))]
async fn create_pharmacy(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Json(body): Json<PharmacyInput>,
) -> Result<Response> {
    let pharmacy = ModeratorService::new(state.pool(), state.sessions())
        .create_pharmacy(&body)
        .await?;
    Ok(created(pharmacy))
}

#[instrument(skip(state, moderator, body), fields(moderator_id = %moderator.id))]
async fn update_pharmacy(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<PharmacyBrandId>,
    Json(body): Json<PharmacyInput>,
) -> Result<Json<PharmacyBrand>> {
    let pharmacy = ModeratorService::new(state.pool(), state.sessions())
        .update_pharmacy(id, &body)
        .await?;
    Ok(Json(pharmacy))
}

/// Delete a pharmacy brand, its branches and every account attached to it.
#[instrument(skip(state, moderator), fields(moderator_id = %moderator.id))]
async fn delete_pharmacy(
    State(state): State<AppState>,
    moderator: RequireModerator,
    Path(id): Path<PharmacyBrandId>,
) -> Result<StatusCode> {
    ModeratorService::new(state.pool(), state.sessions())
        .delete_pharmacy(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
