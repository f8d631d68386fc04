//! Issue, look up and dispense a prescription against a running, seeded
//! server.
//!
//! Run with: `cargo test -p medico-integration-tests -- --ignored`

use chrono::{Duration, Utc};
use medico_integration_tests::{accounts, base_url, client, error_message, login_ok};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

const SEEDED_UCN: &str = "8502124455";

async fn get_json(client: &Client, path: &str) -> Value {
    let resp = client
        .get(format!("{}{path}", base_url()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
    resp.json().await.expect("Failed to parse response")
}

async fn storage(pharmacist: &Client) -> Value {
    get_json(pharmacist, "/api/pharma/pharmacist/storage").await
}

fn stock_of(items: &Value, medicament_id: &Value) -> i64 {
    items
        .as_array()
        .expect("storage is a list")
        .iter()
        .find(|item| &item["medicament_id"] == medicament_id)
        .and_then(|item| item["quantity"].as_i64())
        .unwrap_or_default()
}

fn item_fulfilled(prescription: &Value, medicament_id: &Value) -> bool {
    prescription["medicaments"]
        .as_array()
        .expect("medicaments is a list")
        .iter()
        .find(|item| &item["medicament_id"] == medicament_id)
        .and_then(|item| item["fulfilled"].as_bool())
        .expect("medicament is on the prescription")
}

/// Log in as the seeded doctor and issue a prescription for the seeded
/// citizen. Each item is a medicament name prefix and a quantity; the
/// returned medicament ids follow the same order.
async fn issue(items: &[(&str, i64)]) -> (Value, Vec<Value>) {
    let doctor = client();
    login_ok(&doctor, "doctor", accounts::DOCTOR).await;

    let citizen = get_json(&doctor, &format!("/api/doctor/citizen?ucn={SEEDED_UCN}")).await;

    let mut medicament_ids = Vec::with_capacity(items.len());
    let mut lines = Vec::with_capacity(items.len());
    for (name, quantity) in items {
        let path = format!("/api/doctor/medicaments?name={name}");
        let medicaments = get_json(&doctor, &path).await;
        let medicament_id = medicaments[0]["id"].clone();
        assert!(medicament_id.is_string(), "no medicament matching {name}");
        lines.push(json!({ "medicament_id": medicament_id, "quantity": quantity }));
        medicament_ids.push(medicament_id);
    }

    let resp = doctor
        .post(format!("{}/api/doctor/prescriptions", base_url()))
        .json(&json!({
            "citizen_id": citizen["id"],
            "name": "Integration test",
            "end_date": Utc::now() + Duration::days(7),
            "medicaments": lines,
        }))
        .send()
        .await
        .expect("Failed to create prescription");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let prescription: Value = resp.json().await.expect("Failed to parse prescription");
    assert_eq!(prescription["state"], "active");

    (prescription, medicament_ids)
}

/// Issue a prescription of two units of the first medicament matching `name`.
async fn issue_prescription(name: &str) -> (Value, Value) {
    let (prescription, mut ids) = issue(&[(name, 2)]).await;
    (prescription, ids.remove(0))
}

async fn pharmacist() -> Client {
    let pharmacist = client();
    login_ok(&pharmacist, "pharma/pharmacist", accounts::PHARMACIST).await;
    pharmacist
}

async fn fulfill(pharmacist: &Client, ids: &[&Value]) -> reqwest::Response {
    pharmacist
        .post(format!("{}/api/pharma/pharmacist/fulfill", base_url()))
        .json(&json!({ "prescription_ids": ids }))
        .send()
        .await
        .expect("Failed to fulfill")
}

async fn fulfill_items(
    pharmacist: &Client,
    prescription_id: &Value,
    medicament_ids: &[&Value],
) -> reqwest::Response {
    pharmacist
        .post(format!("{}/api/pharma/pharmacist/fulfill_medicaments", base_url()))
        .json(&json!({
            "prescriptions": [{
                "prescription_id": prescription_id,
                "medicament_ids": medicament_ids,
            }],
        }))
        .send()
        .await
        .expect("Failed to fulfill medicaments")
}

#[tokio::test]
#[ignore = "Requires running server with seeded demo data"]
async fn test_issue_and_fulfill_prescription() {
    let (prescription, medicament_id) = issue_prescription("Paracetamol").await;
    let id = prescription["id"].as_str().expect("prescription id").to_string();

    // The citizen sees it and where to pick it up
    let citizen = client();
    login_ok(&citizen, "citizen", accounts::CITIZEN).await;
    let own = get_json(&citizen, "/api/citizen/prescriptions").await;
    assert!(own.as_array().expect("list").iter().any(|p| p["id"] == id));
    let branches = get_json(
        &citizen,
        &format!("/api/citizen/available_pharmacies?prescription_id={id}"),
    )
    .await;
    assert!(!branches.as_array().expect("list").is_empty());

    // The pharmacist dispenses it
    let pharmacist = client();
    login_ok(&pharmacist, "pharma/pharmacist", accounts::PHARMACIST).await;
    let dispensable = get_json(
        &pharmacist,
        &format!("/api/pharma/pharmacist/prescriptions?ucn={SEEDED_UCN}"),
    )
    .await;
    assert!(dispensable.as_array().expect("list").iter().any(|p| p["id"] == id));

    let before = stock_of(&storage(&pharmacist).await, &medicament_id);

    let fulfill = || {
        pharmacist
            .post(format!("{}/api/pharma/pharmacist/fulfill", base_url()))
            .json(&json!({ "prescription_ids": [id] }))
            .send()
    };

    let resp = fulfill().await.expect("Failed to fulfill");
    assert_eq!(resp.status(), StatusCode::OK);
    let fulfilled: Value = resp.json().await.expect("Failed to parse fulfilled");
    assert_eq!(fulfilled[0]["state"], "fulfilled");
    assert_eq!(fulfilled[0]["medicaments"][0]["fulfilled"], true);

    let after = stock_of(&storage(&pharmacist).await, &medicament_id);
    assert_eq!(after, before - 2);

    // A second fulfillment is refused and leaves stock alone
    let resp = fulfill().await.expect("Failed to fulfill");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(
        error_message(resp).await,
        "prescription has already been fulfilled"
    );
    let again = stock_of(&storage(&pharmacist).await, &medicament_id);
    assert_eq!(again, after);
}

#[tokio::test]
#[ignore = "Requires running server with seeded demo data"]
async fn test_invalidated_prescription_cannot_be_fulfilled() {
    let (prescription, _) = issue_prescription("Ibuprofen").await;
    let id = prescription["id"].as_str().expect("prescription id").to_string();

    let doctor = client();
    login_ok(&doctor, "doctor", accounts::DOCTOR).await;
    let resp = doctor
        .post(format!("{}/api/doctor/prescriptions/{id}/invalidate", base_url()))
        .send()
        .await
        .expect("Failed to invalidate");
    assert_eq!(resp.status(), StatusCode::OK);
    let invalid: Value = resp.json().await.expect("Failed to parse prescription");
    assert_eq!(invalid["state"], "invalid");

    let pharmacist = client();
    login_ok(&pharmacist, "pharma/pharmacist", accounts::PHARMACIST).await;
    let resp = pharmacist
        .post(format!("{}/api/pharma/pharmacist/fulfill", base_url()))
        .json(&json!({ "prescription_ids": [id] }))
        .send()
        .await
        .expect("Failed to fulfill");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(error_message(resp).await, "prescription is no longer valid");
}

#[tokio::test]
#[ignore = "Requires running server with seeded demo data"]
async fn test_prescription_in_the_past_is_rejected() {
    let doctor = client();
    login_ok(&doctor, "doctor", accounts::DOCTOR).await;
    let citizen = get_json(&doctor, &format!("/api/doctor/citizen?ucn={SEEDED_UCN}")).await;
    let medicaments = get_json(&doctor, "/api/doctor/medicaments?name=Amox").await;

    let resp = doctor
        .post(format!("{}/api/doctor/prescriptions", base_url()))
        .json(&json!({
            "citizen_id": citizen["id"],
            "name": "Too late",
            "end_date": Utc::now() - Duration::days(1),
            "medicaments": [{ "medicament_id": medicaments[0]["id"], "quantity": 1 }],
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running server with seeded demo data"]
async fn test_short_stock_rolls_back_every_prescription() {
    let (coverable, coverable_ids) = issue(&[("Paracetamol", 1)]).await;
    let (short, short_ids) = issue(&[("Amoxicillin", 1_000_000)]).await;

    let pharmacist = pharmacist().await;
    let before = storage(&pharmacist).await;

    let resp = fulfill(&pharmacist, &[&coverable["id"], &short["id"]]).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(
        error_message(resp)
            .await
            .starts_with("insufficient stock of medicament")
    );

    // Neither prescription nor any stock changed
    let after = storage(&pharmacist).await;
    for id in coverable_ids.iter().chain(&short_ids) {
        assert_eq!(stock_of(&after, id), stock_of(&before, id));
    }
    let dispensable = get_json(
        &pharmacist,
        &format!("/api/pharma/pharmacist/prescriptions?ucn={SEEDED_UCN}"),
    )
    .await;
    let still_active = dispensable
        .as_array()
        .expect("list")
        .iter()
        .find(|p| p["id"] == coverable["id"])
        .expect("coverable prescription is still dispensable");
    assert_eq!(still_active["state"], "active");
    assert!(!item_fulfilled(still_active, &coverable_ids[0]));

    // On its own the coverable prescription goes through
    let resp = fulfill(&pharmacist, &[&coverable["id"]]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let after = storage(&pharmacist).await;
    assert_eq!(
        stock_of(&after, &coverable_ids[0]),
        stock_of(&before, &coverable_ids[0]) - 1
    );
}

#[tokio::test]
#[ignore = "Requires running server with seeded demo data"]
async fn test_partial_fulfillment_completes_on_last_item() {
    let (prescription, ids) = issue(&[("Paracetamol", 1), ("Ibuprofen", 1)]).await;
    let (first, second) = (&ids[0], &ids[1]);
    let pharmacist = pharmacist().await;

    let resp = fulfill_items(&pharmacist, &prescription["id"], &[first]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let partial: Value = resp.json().await.expect("Failed to parse prescriptions");
    assert_eq!(partial[0]["state"], "active");
    assert!(item_fulfilled(&partial[0], first));
    assert!(!item_fulfilled(&partial[0], second));

    // An item already handed out is not pending anymore
    let resp = fulfill_items(&pharmacist, &prescription["id"], &[first]).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = fulfill_items(&pharmacist, &prescription["id"], &[second]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let done: Value = resp.json().await.expect("Failed to parse prescriptions");
    assert_eq!(done[0]["state"], "fulfilled");
    assert!(item_fulfilled(&done[0], first));
    assert!(item_fulfilled(&done[0], second));
}

#[tokio::test]
#[ignore = "Requires running server with seeded demo data"]
async fn test_concurrent_fulfillments_sharing_medicaments() {
    let (one, two) = (pharmacist().await, pharmacist().await);

    for _ in 0..10 {
        // Same medicaments, listed in opposite orders
        let (a, _) = issue(&[("Paracetamol", 1), ("Ibuprofen", 1)]).await;
        let (b, _) = issue(&[("Ibuprofen", 1), ("Paracetamol", 1)]).await;

        let (ids_a, ids_b) = ([&a["id"]], [&b["id"]]);
        let (ra, rb) = tokio::join!(fulfill(&one, &ids_a), fulfill(&two, &ids_b));
        assert_eq!(ra.status(), StatusCode::OK);
        assert_eq!(rb.status(), StatusCode::OK);
    }
}
