//! Admin route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
};
use tracing::instrument;

use medico_core::{ModeratorId, Role};

use super::{LoginRequest, created, login_response, logout_response};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireAdmin;
use crate::models::{Admin, Moderator};
use crate::services::admin::NewModeratorInput;
use crate::services::{AdminService, AuthService};
use crate::state::AppState;

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
        .route("/moderators", get(list_moderators).post(create_moderator))
        .route("/moderators/{id}", delete(delete_moderator))
}

/// Log in as an admin.
#[instrument(skip_all)]
async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Result<Response> {
    let outcome = AuthService::new(state.pool(), state.sessions())
        .login(Role::Admin, &body.email, &body.password)
        .await?;

    set_sentry_user(&outcome.user_id, Role::Admin.namespace());
    Ok(login_response(&state, &outcome, None))
}

#[instrument(skip_all)]
async fn logout(State(state): State<AppState>, admin: RequireAdmin) -> Response {
    AuthService::new(state.pool(), state.sessions())
        .logout(Role::Admin, admin.token)
        .await;

    clear_sentry_user();
    logout_response(&state, false)
}

#[instrument(skip_all, fields(admin_id = %admin.id))]
async fn session(State(state): State<AppState>, admin: RequireAdmin) -> Result<Json<Admin>> {
    let admin = AdminService::new(state.pool(), state.sessions())
        .profile(admin.id)
        .await?;
    Ok(Json(admin))
}

#[instrument(skip_all)]
async fn list_moderators(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Vec<Moderator>>> {
    let moderators = AdminService::new(state.pool(), state.sessions())
        .moderators()
        .await?;
    Ok(Json(moderators))
}

#[instrument(skip_all, fields(admin_id = %admin.id))]
async fn create_moderator(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Json(body): Json<NewModeratorInput>,
) -> Result<Response> {
    let moderator = AdminService::new(state.pool(), state.sessions())
        .create_moderator(&body)
        .await?;
    Ok(created(moderator))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
async fn delete_moderator(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<ModeratorId>,
) -> Result<StatusCode> {
    AdminService::new(state.pool(), state.sessions())
        .delete_moderator(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
