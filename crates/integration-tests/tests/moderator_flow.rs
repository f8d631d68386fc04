//! Moderator CRUD and kind checks against a running, seeded server.
//!
//! Run with: `cargo test -p medico-integration-tests -- --ignored`

use medico_integration_tests::{accounts, base_url, client, error_message, login_ok};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
#[ignore = "Requires running server with seeded demo data"]
async fn test_moderator_login_reports_kind() {
    let client = client();
    let body = login_ok(&client, "moderator", accounts::DOCTOR_MODERATOR).await;
    assert_eq!(body["type"], "doctor");

    let resp = client
        .get(format!("{}/api/moderator/session", base_url()))
        .send()
        .await
        .expect("Failed to get session");
    assert_eq!(resp.status(), StatusCode::OK);
    let session: Value = resp.json().await.expect("Failed to parse session");
    assert_eq!(session["id"], body["id"]);
    assert_eq!(session["type"], "doctor");
}

#[tokio::test]
#[ignore = "Requires running server with seeded demo data"]
async fn test_moderator_cannot_manage_other_entities() {
    let client = client();
    login_ok(&client, "moderator", accounts::CITIZEN_MODERATOR).await;

    let resp = client
        .get(format!("{}/api/moderator/get_doctors", base_url()))
        .send()
        .await
        .expect("Failed to list doctors");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_message(resp).await, "mismatched role");

    let resp = client
        .get(format!("{}/api/moderator/get_citizens", base_url()))
        .send()
        .await
        .expect("Failed to list citizens");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server with seeded demo data"]
async fn test_doctor_crud() {
    let client = client();
    let base = base_url();
    login_ok(&client, "moderator", accounts::DOCTOR_MODERATOR).await;

    // UINs are ten alphanumerics; derive a unique one per run
    let suffix = Uuid::new_v4().simple().to_string();
    let uin: String = std::iter::once('T').chain(suffix.chars().take(9)).collect();
    let email = format!("dr.{suffix}@medico.example");

    let resp = client
        .post(format!("{base}/api/moderator/create_doctor"))
        .json(&json!({
            "first_name": "Petar",
            "second_name": "Ivanov",
            "last_name": "Georgiev",
            "uin": uin,
            "email": email,
            "password": medico_integration_tests::seed_password(),
        }))
        .send()
        .await
        .expect("Failed to create doctor");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let doctor: Value = resp.json().await.expect("Failed to parse doctor");
    let id = doctor["id"].as_str().expect("doctor id").to_string();

    let resp = client
        .put(format!("{base}/api/moderator/update_doctor/{id}"))
        .json(&json!({
            "first_name": "Petar",
            "second_name": "Ivanov",
            "last_name": "Stoyanov",
            "uin": uin,
            "email": email,
        }))
        .send()
        .await
        .expect("Failed to update doctor");
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.expect("Failed to parse doctor");
    assert_eq!(updated["last_name"], "Stoyanov");

    // The new doctor can log in with the password set at creation
    login_ok(&medico_integration_tests::client(), "doctor", &email).await;

    let resp = client
        .delete(format!("{base}/api/moderator/delete_doctor/{id}"))
        .send()
        .await
        .expect("Failed to delete doctor");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .get(format!("{base}/api/moderator/get_doctor/{id}"))
        .send()
        .await
        .expect("Failed to get doctor");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running server with seeded demo data"]
async fn test_duplicate_email_conflicts() {
    let client = client();
    login_ok(&client, "moderator", accounts::DOCTOR_MODERATOR).await;

    let resp = client
        .post(format!("{}/api/moderator/create_doctor", base_url()))
        .json(&json!({
            "first_name": "Petar",
            "second_name": "Ivanov",
            "last_name": "Georgiev",
            "uin": "DUPEMAIL01",
            "email": accounts::DOCTOR,
            "password": medico_integration_tests::seed_password(),
        }))
        .send()
        .await
        .expect("Failed to create doctor");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
