//! Session namespaces and moderator path rules, through the public API.

use std::time::Duration;

use medico_core::{ModeratorKind, Role};
use medico_server::config::SessionConfig;
use medico_server::middleware::auth::required_moderator_kind;
use medico_server::services::SessionStore;
use uuid::Uuid;

fn store() -> SessionStore {
    SessionStore::new(&SessionConfig {
        ttl: Duration::from_secs(60),
        ..SessionConfig::default()
    })
}

#[tokio::test]
async fn test_token_only_resolves_in_its_own_namespace() {
    let sessions = store();
    let user = Uuid::new_v4();
    let token = sessions.create(Role::Pharmacist, user).await;

    assert_eq!(sessions.get(Role::Pharmacist, token).await, Some(user));
    for role in [
        Role::Admin,
        Role::Citizen,
        Role::Doctor,
        Role::PharmacyOwner,
        Role::Moderator(ModeratorKind::Pharmacy),
    ] {
        assert_eq!(sessions.get(role, token).await, None, "{role} accepted the token");
    }
}

#[tokio::test]
async fn test_moderator_kinds_are_separate_namespaces() {
    let sessions = store();
    let user = Uuid::new_v4();
    let token = sessions
        .create(Role::Moderator(ModeratorKind::Medicament), user)
        .await;

    assert_eq!(
        sessions
            .get(Role::Moderator(ModeratorKind::Medicament), token)
            .await,
        Some(user)
    );
    assert_eq!(
        sessions
            .get(Role::Moderator(ModeratorKind::Doctor), token)
            .await,
        None
    );
}

#[tokio::test]
async fn test_logout_and_revoke() {
    let sessions = store();
    let user = Uuid::new_v4();
    let first = sessions.create(Role::Citizen, user).await;
    let second = sessions.create(Role::Citizen, user).await;
    let other = sessions.create(Role::Citizen, Uuid::new_v4()).await;

    sessions.delete(Role::Citizen, first).await;
    assert_eq!(sessions.get(Role::Citizen, first).await, None);
    assert_eq!(sessions.get(Role::Citizen, second).await, Some(user));

    sessions.revoke_user(Role::Citizen, user).await;
    assert_eq!(sessions.get(Role::Citizen, second).await, None);
    assert!(sessions.get(Role::Citizen, other).await.is_some());
}

#[test]
fn test_moderator_paths() {
    let cases = [
        ("/api/moderator/get_doctors", Some(ModeratorKind::Doctor)),
        ("/api/moderator/delete_doctor/7", Some(ModeratorKind::Doctor)),
        ("/api/moderator/get_pharmacies", Some(ModeratorKind::Pharmacy)),
        ("/api/moderator/update_pharmacy/1", Some(ModeratorKind::Pharmacy)),
        ("/api/moderator/create_citizen", Some(ModeratorKind::Citizen)),
        ("/api/moderator/get_medicaments", Some(ModeratorKind::Medicament)),
        ("/api/moderator/session", None),
        ("/api/moderator/logout", None),
        ("/api/doctor/prescriptions", None),
    ];

    for (path, expected) in cases {
        assert_eq!(required_moderator_kind(path), expected, "{path}");
    }
}
