//! Medico server library.
//!
//! JSON REST API for citizens, doctors, pharmacy owners, pharmacists,
//! moderators and admins. Exposed as a library so the CLI can reuse the
//! repositories and password hashing, and so the router can be tested
//! without binding a socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    routing::get,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the full application router: health checks, API routes, tracing
/// and CORS.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_origins);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// CORS for the browser frontends.
///
/// Session cookies only travel cross-origin to the configured origins. With
/// no origins configured any origin may call the API, but without
/// credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|e| tracing::warn!(origin, error = %e, "ignoring CORS origin"))
                .ok()
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use medico_core::{ModeratorKind, Role};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use url::Url;
    use uuid::Uuid;

    use super::*;
    use crate::config::{ServerConfig, SessionConfig};

    fn test_state() -> AppState {
        test_state_with_origins(vec![])
    }

    fn test_state_with_origins(cors_origins: Vec<String>) -> AppState {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://medico@localhost/medico_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("http://localhost:3000").unwrap(),
            session: SessionConfig::default(),
            cors_origins,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        // Never connects: these tests stop before any query runs.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://medico@localhost/medico_test")
            .unwrap();
        AppState::new(config, pool)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(test_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn health_from(origin: &str) -> Request<Body> {
        Request::get("/health")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_without_origins_omits_credentials() {
        let response = app(test_state())
            .oneshot(health_from("https://evil.example"))
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(
            headers
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_cors_with_origins_allows_credentials() {
        let state = test_state_with_origins(vec!["https://app.medico.example".to_string()]);

        let response = app(state.clone())
            .oneshot(health_from("https://app.medico.example"))
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.medico.example"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

        let response = app(state)
            .oneshot(health_from("https://evil.example"))
            .await
            .unwrap();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let response = app(test_state())
            .oneshot(
                Request::get("/api/citizen/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["err"], true);
        assert_eq!(body["msg"], "no session");
    }

    #[tokio::test]
    async fn test_session_from_other_role_is_rejected() {
        let state = test_state();
        let token = state.sessions().create(Role::Doctor, Uuid::new_v4()).await;

        let response = app(state)
            .oneshot(
                Request::get("/api/citizen/session")
                    .header(header::COOKIE, format!("medico_session={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["msg"], "session expired");
    }

    #[tokio::test]
    async fn test_moderator_session() {
        let state = test_state();
        let id = Uuid::new_v4();
        let token = state
            .sessions()
            .create(Role::Moderator(ModeratorKind::Medicament), id)
            .await;

        let response = app(state)
            .oneshot(
                Request::get("/api/moderator/session")
                    .header(
                        header::COOKIE,
                        format!("medico_session={token}; moderator_type=medicament"),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], id.to_string());
        assert_eq!(body["type"], "medicament");
    }

    #[tokio::test]
    async fn test_moderator_of_other_kind_is_forbidden() {
        let state = test_state();
        let token = state
            .sessions()
            .create(Role::Moderator(ModeratorKind::Citizen), Uuid::new_v4())
            .await;

        let response = app(state)
            .oneshot(
                Request::get("/api/moderator/get_doctors")
                    .header(
                        header::COOKIE,
                        format!("medico_session={token}; moderator_type=citizen"),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["msg"], "mismatched role");
    }

    #[tokio::test]
    async fn test_moderator_cookie_must_match_session_namespace() {
        let state = test_state();
        let token = state
            .sessions()
            .create(Role::Moderator(ModeratorKind::Citizen), Uuid::new_v4())
            .await;

        let response = app(state)
            .oneshot(
                Request::get("/api/moderator/get_doctors")
                    .header(
                        header::COOKIE,
                        format!("medico_session={token}; moderator_type=doctor"),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
