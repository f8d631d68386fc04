//! Integration tests for Medico.
//!
//! # Running Tests
//!
//! The tests under `tests/` marked `#[ignore]` talk to a running server
//! seeded with demo data:
//!
//! ```bash
//! medico-cli migrate
//! MEDICO_SEED_PASSWORD='...' medico-cli seed demo
//! cargo run -p medico-server &
//! MEDICO_SEED_PASSWORD='...' cargo test -p medico-integration-tests -- --ignored
//! ```
//!
//! The remaining tests exercise the public library surface and need no
//! services.

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("MEDICO_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Password shared by every seeded demo account.
///
/// # Panics
///
/// Panics if `MEDICO_SEED_PASSWORD` is not set.
#[must_use]
pub fn seed_password() -> String {
    std::env::var("MEDICO_SEED_PASSWORD").expect("MEDICO_SEED_PASSWORD must be set")
}

/// Seeded account emails.
pub mod accounts {
    pub const CITIZEN: &str = "citizen@medico.example";
    pub const DOCTOR: &str = "doctor@medico.example";
    pub const OWNER: &str = "owner@medico.example";
    pub const PHARMACIST: &str = "pharmacist@medico.example";
    pub const CITIZEN_MODERATOR: &str = "citizen.moderator@medico.example";
    pub const DOCTOR_MODERATOR: &str = "doctor.moderator@medico.example";
}

/// A client that keeps cookies between requests, like a browser.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Log in at `{base}/api/{scope}/login` and return the response.
///
/// # Panics
///
/// Panics if the request cannot be sent.
pub async fn login(client: &Client, scope: &str, email: &str, password: &str) -> Response {
    client
        .post(format!("{}/api/{scope}/login", base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request")
}

/// Log in and assert it worked, returning the login body.
///
/// # Panics
///
/// Panics if the login is rejected.
pub async fn login_ok(client: &Client, scope: &str, email: &str) -> Value {
    let resp = login(client, scope, email, &seed_password()).await;
    assert_eq!(resp.status(), StatusCode::OK, "login to {scope} failed");
    resp.json().await.expect("Failed to parse login response")
}

/// Read an error body and return its message, asserting the shape.
///
/// # Panics
///
/// Panics if the body is not `{"err": true, "msg": ...}`.
pub async fn error_message(resp: Response) -> String {
    let body: Value = resp.json().await.expect("Failed to parse error body");
    assert_eq!(body["err"], true);
    body["msg"]
        .as_str()
        .expect("error body has no message")
        .to_string()
}
