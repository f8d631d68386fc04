//! Account roles and prescription states.

use serde::{Deserialize, Serialize};

/// The entity type a moderator is allowed to manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "medico.moderator_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ModeratorKind {
    Doctor,
    Citizen,
    Pharmacy,
    Medicament,
}

impl ModeratorKind {
    /// Every kind, in a stable order.
    pub const ALL: [Self; 4] = [Self::Doctor, Self::Citizen, Self::Pharmacy, Self::Medicament];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Citizen => "citizen",
            Self::Pharmacy => "pharmacy",
            Self::Medicament => "medicament",
        }
    }
}

impl std::fmt::Display for ModeratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`ModeratorKind`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("provided moderator type is not valid")]
pub struct InvalidModeratorKind;

impl std::str::FromStr for ModeratorKind {
    type Err = InvalidModeratorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(Self::Doctor),
            "citizen" => Ok(Self::Citizen),
            "pharmacy" => Ok(Self::Pharmacy),
            "medicament" => Ok(Self::Medicament),
            _ => Err(InvalidModeratorKind),
        }
    }
}

/// Who is making a request.
///
/// Each role owns a separate session namespace, so a token minted for a
/// doctor is meaningless to the citizen endpoints and vice versa. Moderators
/// get one namespace per [`ModeratorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Citizen,
    Doctor,
    PharmacyOwner,
    Pharmacist,
    Moderator(ModeratorKind),
}

impl Role {
    /// Session key namespace for this role.
    ///
    /// ```
    /// use medico_core::{ModeratorKind, Role};
    ///
    /// assert_eq!(Role::Pharmacist.namespace(), "pharmacy:pharmacist");
    /// assert_eq!(Role::Moderator(ModeratorKind::Citizen).namespace(), "moderator:citizen");
    /// ```
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Citizen => "citizen",
            Self::Doctor => "doctor",
            Self::PharmacyOwner => "pharmacy:owner",
            Self::Pharmacist => "pharmacy:pharmacist",
            Self::Moderator(ModeratorKind::Doctor) => "moderator:doctor",
            Self::Moderator(ModeratorKind::Citizen) => "moderator:citizen",
            Self::Moderator(ModeratorKind::Pharmacy) => "moderator:pharmacy",
            Self::Moderator(ModeratorKind::Medicament) => "moderator:medicament",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.namespace())
    }
}

/// Lifecycle of a prescription.
///
/// A prescription starts `Active` and ends either `Fulfilled` (all line
/// items dispensed) or `Invalid` (withdrawn by the issuing doctor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "medico.prescription_state", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionState {
    #[default]
    Active,
    Invalid,
    Fulfilled,
}

impl PrescriptionState {
    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Invalid | Self::Fulfilled)
    }

    /// Only active prescriptions may be dispensed.
    #[must_use]
    pub const fn can_fulfill(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for PrescriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Invalid => write!(f, "invalid"),
            Self::Fulfilled => write!(f, "fulfilled"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_moderator_kind_round_trips_through_display() {
        for kind in ModeratorKind::ALL {
            assert_eq!(kind.to_string().parse::<ModeratorKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_moderator_kind_rejects_unknown() {
        let err = "admin".parse::<ModeratorKind>().unwrap_err();
        assert_eq!(err.to_string(), "provided moderator type is not valid");
        assert!("Doctor".parse::<ModeratorKind>().is_err());
    }

    #[test]
    fn test_namespaces_are_distinct() {
        let mut roles = vec![
            Role::Admin,
            Role::Citizen,
            Role::Doctor,
            Role::PharmacyOwner,
            Role::Pharmacist,
        ];
        roles.extend(ModeratorKind::ALL.map(Role::Moderator));

        let mut namespaces: Vec<_> = roles.iter().map(|r| r.namespace()).collect();
        namespaces.sort_unstable();
        namespaces.dedup();
        assert_eq!(namespaces.len(), roles.len());
    }

    #[test]
    fn test_prescription_state() {
        assert!(PrescriptionState::Active.can_fulfill());
        assert!(!PrescriptionState::Active.is_terminal());
        assert!(!PrescriptionState::Fulfilled.can_fulfill());
        assert!(PrescriptionState::Fulfilled.is_terminal());
        assert!(PrescriptionState::Invalid.is_terminal());
        assert_eq!(
            serde_json::to_string(&PrescriptionState::Fulfilled).unwrap(),
            "\"fulfilled\""
        );
    }
}
