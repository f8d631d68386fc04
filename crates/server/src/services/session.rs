//! Server-side session store.
//!
//! Sessions live in a `moka` cache keyed `"{namespace}:{token}"`, where the
//! namespace comes from [`Role::namespace`]. Entries expire a fixed time
//! after login; nothing extends them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use medico_core::Role;

use crate::config::SessionConfig;

/// Opaque session token handed to clients in the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Generate a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Maps session tokens to user IDs, one namespace per role.
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<String, Uuid>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .build();

        Self {
            cache,
            ttl: config.ttl,
        }
    }

    /// How long a new session lives.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(role: Role, token: SessionToken) -> String {
        format!("{}:{token}", role.namespace())
    }

    /// Start a session for `user_id`.
    pub async fn create(&self, role: Role, user_id: Uuid) -> SessionToken {
        let token = SessionToken::generate();
        self.cache.insert(Self::key(role, token), user_id).await;
        tracing::debug!(role = %role, "session created");
        token
    }

    /// Look up the user behind a token.
    pub async fn get(&self, role: Role, token: SessionToken) -> Option<Uuid> {
        self.cache.get(&Self::key(role, token)).await
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn delete(&self, role: Role, token: SessionToken) {
        self.cache.invalidate(&Self::key(role, token)).await;
    }

    /// End every session `user_id` holds in `role`'s namespace.
    pub async fn revoke_user(&self, role: Role, user_id: Uuid) {
        let prefix = format!("{}:", role.namespace());
        let keys: Vec<_> = self
            .cache
            .iter()
            .filter(|(key, id)| *id == user_id && key.starts_with(&prefix))
            .map(|(key, _)| key)
            .collect();

        for key in &keys {
            self.cache.invalidate(key.as_str()).await;
        }

        if !keys.is_empty() {
            tracing::info!(role = %role, %user_id, revoked = keys.len(), "sessions revoked");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use medico_core::ModeratorKind;

    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(&SessionConfig::default())
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        let user = Uuid::new_v4();

        let token = store.create(Role::Doctor, user).await;
        assert_eq!(store.get(Role::Doctor, token).await, Some(user));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = store();
        let user = Uuid::new_v4();

        let token = store.create(Role::Doctor, user).await;
        assert_eq!(store.get(Role::Citizen, token).await, None);
        assert_eq!(
            store
                .get(Role::Moderator(ModeratorKind::Doctor), token)
                .await,
            None
        );

        let token = store
            .create(Role::Moderator(ModeratorKind::Pharmacy), user)
            .await;
        assert_eq!(
            store
                .get(Role::Moderator(ModeratorKind::Citizen), token)
                .await,
            None
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store();
        let token = store.create(Role::Admin, Uuid::new_v4()).await;

        store.delete(Role::Admin, token).await;
        assert_eq!(store.get(Role::Admin, token).await, None);

        // Deleting twice is fine.
        store.delete(Role::Admin, token).await;
    }

    #[tokio::test]
    async fn test_revoke_user_only_touches_that_user_and_role() {
        let store = store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let a1 = store.create(Role::Pharmacist, alice).await;
        let a2 = store.create(Role::Pharmacist, alice).await;
        let b = store.create(Role::Pharmacist, bob).await;
        let owner = store.create(Role::PharmacyOwner, alice).await;

        store.revoke_user(Role::Pharmacist, alice).await;

        assert_eq!(store.get(Role::Pharmacist, a1).await, None);
        assert_eq!(store.get(Role::Pharmacist, a2).await, None);
        assert_eq!(store.get(Role::Pharmacist, b).await, Some(bob));
        assert_eq!(store.get(Role::PharmacyOwner, owner).await, Some(alice));
    }

    #[tokio::test]
    async fn test_sessions_expire() {
        let store = SessionStore::new(&SessionConfig {
            ttl: Duration::from_millis(50),
            ..SessionConfig::default()
        });
        let token = store.create(Role::Citizen, Uuid::new_v4()).await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(store.get(Role::Citizen, token).await, None);
    }

    #[test]
    fn test_token_round_trips_through_text() {
        let token = SessionToken::generate();
        let parsed: SessionToken = token.to_string().parse().unwrap();
        assert_eq!(parsed, token);
        assert!("not-a-uuid".parse::<SessionToken>().is_err());
    }
}
