//! Authentication extractors.
//!
//! Each extractor reads the session cookie, looks the token up in its role's
//! namespace and yields the typed account ID. Handlers that take one of these
//! never run for unauthenticated requests.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn handler(RequireDoctor { id, .. }: RequireDoctor) -> impl IntoResponse {
//!     format!("Hello, doctor {id}!")
//! }
//! ```

use std::sync::LazyLock;

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};
use regex::Regex;
use uuid::Uuid;

use medico_core::{
    AdminId, CitizenId, DoctorId, ModeratorId, ModeratorKind, PharmacistId, PharmacyOwnerId, Role,
};

use super::session::{MODERATOR_TYPE_COOKIE, read_cookie};
use crate::error::AppError;
use crate::services::auth::AuthError;
use crate::services::session::SessionToken;
use crate::state::AppState;

/// Resolve the session cookie to an account ID in `role`'s namespace.
async fn authenticate(
    parts: &Parts,
    state: &AppState,
    role: Role,
) -> Result<(Uuid, SessionToken), AuthError> {
    let raw = read_cookie(&parts.headers, &state.config().session.cookie_name)
        .ok_or(AuthError::SessionMissing)?;
    let token: SessionToken = raw.parse().map_err(|_| AuthError::SessionExpired)?;

    let user_id = state
        .sessions()
        .get(role, token)
        .await
        .ok_or(AuthError::SessionExpired)?;

    Ok((user_id, token))
}

macro_rules! role_extractor {
    ($(#[$meta:meta])* $name:ident, $id:ty, $role:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name {
            /// The authenticated account.
            pub id: $id,
            /// The session token, needed to log out.
            pub token: SessionToken,
        }

        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                let (user_id, token) = authenticate(parts, state, $role).await?;
                Ok(Self {
                    id: <$id>::new(user_id),
                    token,
                })
            }
        }
    };
}

role_extractor!(
    /// Extractor that requires an admin session.
    RequireAdmin,
    AdminId,
    Role::Admin
);
role_extractor!(
    /// Extractor that requires a citizen session.
    RequireCitizen,
    CitizenId,
    Role::Citizen
);
role_extractor!(
    /// Extractor that requires a doctor session.
    RequireDoctor,
    DoctorId,
    Role::Doctor
);
role_extractor!(
    /// Extractor that requires a pharmacy owner session.
    RequirePharmacyOwner,
    PharmacyOwnerId,
    Role::PharmacyOwner
);
role_extractor!(
    /// Extractor that requires a pharmacist session.
    RequirePharmacist,
    PharmacistId,
    Role::Pharmacist
);

/// Moderator endpoints and the kind allowed to call them.
static MODERATOR_PATHS: LazyLock<[(Regex, ModeratorKind); 4]> = LazyLock::new(|| {
    let re = |pattern: &str| Regex::new(pattern).expect("Invalid regex");
    [
        (re(r"^/api/moderator/[a-z]+_doctors?(/|$)"), ModeratorKind::Doctor),
        (
            re(r"^/api/moderator/[a-z]+_pharmac(ies|y)(/|$)"),
            ModeratorKind::Pharmacy,
        ),
        (re(r"^/api/moderator/[a-z]+_citizens?(/|$)"), ModeratorKind::Citizen),
        (
            re(r"^/api/moderator/[a-z]+_medicaments?(/|$)"),
            ModeratorKind::Medicament,
        ),
    ]
});

/// Which moderator kind may call `path`, if the path is kind-specific.
#[must_use]
pub fn required_moderator_kind(path: &str) -> Option<ModeratorKind> {
    MODERATOR_PATHS
        .iter()
        .find(|(pattern, _)| pattern.is_match(path))
        .map(|(_, kind)| *kind)
}

/// Extractor that requires a moderator session allowed to call this path.
///
/// The `moderator_type` cookie selects the session namespace. Entity
/// endpoints such as `/api/moderator/get_doctors` are then only open to
/// moderators of the matching kind; others get `403 mismatched role`.
#[derive(Debug, Clone, Copy)]
pub struct RequireModerator {
    /// The authenticated moderator.
    pub id: ModeratorId,
    /// The moderator's kind.
    pub kind: ModeratorKind,
    /// The session token, needed to log out.
    pub token: SessionToken,
}

impl FromRequestParts<AppState> for RequireModerator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let kind: ModeratorKind = read_cookie(&parts.headers, MODERATOR_TYPE_COOKIE)
            .ok_or(AuthError::SessionMissing)?
            .parse()
            .map_err(|_| AuthError::SessionExpired)?;

        let (user_id, token) = authenticate(parts, state, Role::Moderator(kind)).await?;

        // Routers may be nested, so match against the full request path.
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| parts.uri.path(), |original| original.0.path());

        if required_moderator_kind(path).is_some_and(|required| required != kind) {
            tracing::warn!(%user_id, moderator_kind = %kind, path, "moderator role mismatch");
            return Err(AuthError::RoleMismatch.into());
        }

        Ok(Self {
            id: ModeratorId::new(user_id),
            kind,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_moderator_kind() {
        assert_eq!(
            required_moderator_kind("/api/moderator/get_doctors"),
            Some(ModeratorKind::Doctor)
        );
        assert_eq!(
            required_moderator_kind("/api/moderator/update_doctor/4f6c"),
            Some(ModeratorKind::Doctor)
        );
        assert_eq!(
            required_moderator_kind("/api/moderator/get_pharmacies"),
            Some(ModeratorKind::Pharmacy)
        );
        assert_eq!(
            required_moderator_kind("/api/moderator/delete_pharmacy/1"),
            Some(ModeratorKind::Pharmacy)
        );
        assert_eq!(
            required_moderator_kind("/api/moderator/create_citizen"),
            Some(ModeratorKind::Citizen)
        );
        assert_eq!(
            required_moderator_kind("/api/moderator/get_medicaments"),
            Some(ModeratorKind::Medicament)
        );
    }

    #[test]
    fn test_shared_moderator_paths_need_no_kind() {
        assert_eq!(required_moderator_kind("/api/moderator/session"), None);
        assert_eq!(required_moderator_kind("/api/moderator/logout"), None);
        assert_eq!(required_moderator_kind("/api/doctor/citizens"), None);
    }
}
