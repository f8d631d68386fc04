//! Login credentials and the staff accounts without a richer profile.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use medico_core::{AdminId, Email, ModeratorId, ModeratorKind};

/// What a login needs to know about an account.
///
/// The `id` is the raw profile key; the role that was queried decides which
/// typed id it becomes.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: Uuid,
    pub password_hash: String,
}

/// A platform administrator.
#[derive(Debug, Clone, Serialize)]
pub struct Admin {
    pub id: AdminId,
    pub name: String,
    pub email: Email,
    pub created_at: DateTime<Utc>,
}

/// A moderator, allowed to manage one kind of entity.
#[derive(Debug, Clone, Serialize)]
pub struct Moderator {
    pub id: ModeratorId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    #[serde(rename = "type")]
    pub kind: ModeratorKind,
    pub created_at: DateTime<Utc>,
}
