//! Pharmacy owner and pharmacist route handlers.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::Response,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use medico_core::Role;

use super::{LoginRequest, created, login_response, logout_response};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequirePharmacist, RequirePharmacyOwner};
use crate::models::{Pharmacist, PharmacyBranch, PharmacyBrand, Prescription, StorageItem};
use crate::services::pharmacy::{
    FulfillInput, FulfillItemsInput, NewBranchInput, NewPharmacistInput, StorageInput,
};
use crate::services::{AuthService, PharmacyService};
use crate::state::AppState;

/// Build the pharmacy owner router.
pub fn owner_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(owner_login))
        .route("/logout", post(owner_logout))
        .route("/session", get(owner_session))
        .route("/branches", get(branches).post(create_branch))
        .route("/pharmacists", get(pharmacists).post(create_pharmacist))
}

/// Build the pharmacist router.
pub fn pharmacist_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(pharmacist_login))
        .route("/logout", post(pharmacist_logout))
        .route("/session", get(pharmacist_session))
        .route("/prescriptions", get(prescriptions))
        .route("/fulfill", post(fulfill))
        .route("/fulfill_medicaments", post(fulfill_medicaments))
        .route("/storage", get(storage).post(add_storage))
}

/// Query for a citizen's dispensable prescriptions.
#[derive(Debug, Deserialize)]
pub struct UcnQuery {
    pub ucn: String,
}

// =============================================================================
// Owner
// =============================================================================

#[instrument(skip_all)]
async fn owner_login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response> {
    let outcome = AuthService::new(state.pool(), state.sessions())
        .login(Role::PharmacyOwner, &body.email, &body.password)
        .await?;

    set_sentry_user(&outcome.user_id, Role::PharmacyOwner.namespace());
    Ok(login_response(&state, &outcome, None))
}

#[instrument(skip_all)]
async fn owner_logout(State(state): State<AppState>, owner: RequirePharmacyOwner) -> Response {
    AuthService::new(state.pool(), state.sessions())
        .logout(Role::PharmacyOwner, owner.token)
        .await;

    clear_sentry_user();
    logout_response(&state, false)
}

/// The owner's session resolves to the brand they run.
#[instrument(skip_all, fields(owner_id = %owner.id))]
async fn owner_session(
    State(state): State<AppState>,
    owner: RequirePharmacyOwner,
) -> Result<Json<PharmacyBrand>> {
    Ok(Json(
        PharmacyService::new(state.pool())
            .owner_profile(owner.id)
            .await?,
    ))
}

#[instrument(skip_all, fields(owner_id = %owner.id))]
async fn branches(
    State(state): State<AppState>,
    owner: RequirePharmacyOwner,
) -> Result<Json<Vec<PharmacyBranch>>> {
    Ok(Json(PharmacyService::new(state.pool()).branches(owner.id).await?))
}

#[instrument(skip_all, fields(owner_id = %owner.id))]
async fn create_branch(
    State(state): State<AppState>,
    owner: RequirePharmacyOwner,
    Json(body): Json<NewBranchInput>,
) -> Result<Response> {
    let branch = PharmacyService::new(state.pool())
        .create_branch(owner.id, &body)
        .await?;
    Ok(created(branch))
}

#[instrument(skip_all, fields(owner_id = %owner.id))]
async fn pharmacists(
    State(state): State<AppState>,
    owner: RequirePharmacyOwner,
) -> Result<Json<Vec<Pharmacist>>> {
    Ok(Json(
        PharmacyService::new(state.pool())
            .pharmacists(owner.id)
            .await?,
    ))
}

#[instrument(skip_all, fields(owner_id = %owner.id, branch_id = %body.branch_id))]
async fn create_pharmacist(
    State(state): State<AppState>,
    owner: RequirePharmacyOwner,
    Json(body): Json<NewPharmacistInput>,
) -> Result<Response> {
    let pharmacist = PharmacyService::new(state.pool())
        .create_pharmacist(owner.id, &body)
        .await?;
    Ok(created(pharmacist))
}

// =============================================================================
// Pharmacist
// =============================================================================

#[instrument(skip_all)]
async fn pharmacist_login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response> {
    let outcome = AuthService::new(state.pool(), state.sessions())
        .login(Role::Pharmacist, &body.email, &body.password)
        .await?;

    set_sentry_user(&outcome.user_id, Role::Pharmacist.namespace());
    Ok(login_response(&state, &outcome, None))
}

#[instrument(skip_all)]
async fn pharmacist_logout(
    State(state): State<AppState>,
    pharmacist: RequirePharmacist,
) -> Response {
    AuthService::new(state.pool(), state.sessions())
        .logout(Role::Pharmacist, pharmacist.token)
        .await;

    clear_sentry_user();
    logout_response(&state, false)
}

#[instrument(skip_all, fields(pharmacist_id = %pharmacist.id))]
async fn pharmacist_session(
    State(state): State<AppState>,
    pharmacist: RequirePharmacist,
) -> Result<Json<Pharmacist>> {
    Ok(Json(
        PharmacyService::new(state.pool())
            .pharmacist_profile(pharmacist.id)
            .await?,
    ))
}

/// A citizen's prescriptions that can be dispensed today.
#[instrument(skip_all, fields(pharmacist_id = %pharmacist.id))]
async fn prescriptions(
    State(state): State<AppState>,
    pharmacist: RequirePharmacist,
    Query(query): Query<UcnQuery>,
) -> Result<Json<Vec<Prescription>>> {
    Ok(Json(
        PharmacyService::new(state.pool())
            .dispensable_prescriptions(&query.ucn, Utc::now())
            .await?,
    ))
}

/// Dispense whole prescriptions from the pharmacist's branch.
#[instrument(skip_all, fields(pharmacist_id = %pharmacist.id))]
async fn fulfill(
    State(state): State<AppState>,
    pharmacist: RequirePharmacist,
    Json(body): Json<FulfillInput>,
) -> Result<Json<Vec<Prescription>>> {
    Ok(Json(
        PharmacyService::new(state.pool())
            .fulfill(pharmacist.id, &body, Utc::now())
            .await?,
    ))
}

/// Dispense selected line items.
#[instrument(skip_all, fields(pharmacist_id = %pharmacist.id))]
async fn fulfill_medicaments(
    State(state): State<AppState>,
    pharmacist: RequirePharmacist,
    Json(body): Json<FulfillItemsInput>,
) -> Result<Json<Vec<Prescription>>> {
    Ok(Json(
        PharmacyService::new(state.pool())
            .fulfill_medicaments(pharmacist.id, &body, Utc::now())
            .await?,
    ))
}

#[instrument(skip_all, fields(pharmacist_id = %pharmacist.id))]
async fn storage(
    State(state): State<AppState>,
    pharmacist: RequirePharmacist,
) -> Result<Json<Vec<StorageItem>>> {
    Ok(Json(
        PharmacyService::new(state.pool())
            .storage(pharmacist.id)
            .await?,
    ))
}

#[instrument(skip_all, fields(pharmacist_id = %pharmacist.id))]
async fn add_storage(
    State(state): State<AppState>,
    pharmacist: RequirePharmacist,
    Json(body): Json<StorageInput>,
) -> Result<Json<Vec<StorageItem>>> {
    Ok(Json(
        PharmacyService::new(state.pool())
            .add_storage(pharmacist.id, &body)
            .await?,
    ))
}
