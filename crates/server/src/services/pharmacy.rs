//! Pharmacy service: owners run branches and staff, pharmacists dispense.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use medico_core::{
    Coordinates, Email, MedicamentId, PharmacistId, PharmacyBranchId, PharmacyOwnerId,
    PrescriptionId, PrescriptionState, Ucn, validate_name,
};

use super::auth::{AuthError, hash_new_password};
use super::{PERSON_NAME_MAX, PERSON_NAME_MIN, PLACE_NAME_MAX, PLACE_NAME_MIN};
use crate::db::pharmacies::NewPharmacist;
use crate::db::prescriptions::Dispense;
use crate::db::{CitizenRepository, PharmacyRepository, PrescriptionRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::models::{Pharmacist, PharmacyBranch, PharmacyBrand, Prescription, StorageItem};

/// Request body for a new branch.
#[derive(Debug, Deserialize)]
pub struct NewBranchInput {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Request body for a new pharmacist.
#[derive(Debug, Deserialize)]
pub struct NewPharmacistInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub branch_id: PharmacyBranchId,
}

/// Request body for dispensing whole prescriptions.
#[derive(Debug, Deserialize)]
pub struct FulfillInput {
    pub prescription_ids: Vec<PrescriptionId>,
}

/// Medicaments to dispense from one prescription.
#[derive(Debug, Clone, Deserialize)]
pub struct FulfillItemsEntry {
    pub prescription_id: PrescriptionId,
    pub medicament_ids: Vec<MedicamentId>,
}

/// Request body for dispensing individual line items.
#[derive(Debug, Deserialize)]
pub struct FulfillItemsInput {
    pub prescriptions: Vec<FulfillItemsEntry>,
}

/// One medicament delivered to a branch.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageEntry {
    pub medicament_id: MedicamentId,
    pub quantity: i32,
}

/// Request body for adding stock.
#[derive(Debug, Deserialize)]
pub struct StorageInput {
    pub medicaments: Vec<StorageEntry>,
}

fn unique<T: Copy + Eq + std::hash::Hash>(ids: impl IntoIterator<Item = T>) -> bool {
    let mut seen = HashSet::new();
    ids.into_iter().all(|id| seen.insert(id))
}

fn dispense_requests(input: &FulfillInput) -> Result<Vec<(PrescriptionId, Dispense)>> {
    if input.prescription_ids.is_empty() {
        return Err(AppError::BadRequest(
            "no prescriptions to fulfill".to_string(),
        ));
    }
    if !unique(input.prescription_ids.iter().copied()) {
        return Err(AppError::BadRequest(
            "a prescription is listed twice".to_string(),
        ));
    }

    Ok(input
        .prescription_ids
        .iter()
        .map(|id| (*id, Dispense::All))
        .collect())
}

fn dispense_item_requests(input: &FulfillItemsInput) -> Result<Vec<(PrescriptionId, Dispense)>> {
    if input.prescriptions.is_empty() {
        return Err(AppError::BadRequest(
            "no prescriptions to fulfill".to_string(),
        ));
    }
    if !unique(input.prescriptions.iter().map(|e| e.prescription_id)) {
        return Err(AppError::BadRequest(
            "a prescription is listed twice".to_string(),
        ));
    }

    input
        .prescriptions
        .iter()
        .map(|entry| {
            if entry.medicament_ids.is_empty() {
                return Err(AppError::BadRequest(format!(
                    "no medicaments selected for prescription {}",
                    entry.prescription_id
                )));
            }
            if !unique(entry.medicament_ids.iter().copied()) {
                return Err(AppError::BadRequest(format!(
                    "a medicament is listed twice for prescription {}",
                    entry.prescription_id
                )));
            }
            Ok((
                entry.prescription_id,
                Dispense::Items(entry.medicament_ids.clone()),
            ))
        })
        .collect()
}

fn storage_items(input: &StorageInput) -> Result<Vec<(MedicamentId, i32)>> {
    if input.medicaments.is_empty() {
        return Err(AppError::BadRequest("no medicaments to add".to_string()));
    }
    if input.medicaments.iter().any(|e| e.quantity <= 0) {
        return Err(AppError::BadRequest(
            "medicament quantity must be positive".to_string(),
        ));
    }
    if !unique(input.medicaments.iter().map(|e| e.medicament_id)) {
        return Err(AppError::BadRequest(
            "a medicament is listed twice".to_string(),
        ));
    }

    Ok(input
        .medicaments
        .iter()
        .map(|e| (e.medicament_id, e.quantity))
        .collect())
}

/// Pharmacy service.
pub struct PharmacyService<'a> {
    pharmacies: PharmacyRepository<'a>,
    citizens: CitizenRepository<'a>,
    prescriptions: PrescriptionRepository<'a>,
}

impl<'a> PharmacyService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pharmacies: PharmacyRepository::new(pool),
            citizens: CitizenRepository::new(pool),
            prescriptions: PrescriptionRepository::new(pool),
        }
    }

    // =========================================================================
    // Owners
    // =========================================================================

    /// The brand run by the logged-in owner.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the account no longer exists.
    pub async fn owner_profile(&self, owner_id: PharmacyOwnerId) -> Result<PharmacyBrand> {
        self.pharmacies
            .brand_of_owner(owner_id)
            .await?
            .ok_or_else(|| AuthError::SessionExpired.into())
    }

    /// Branches of the owner's brand.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn branches(&self, owner_id: PharmacyOwnerId) -> Result<Vec<PharmacyBranch>> {
        Ok(self.pharmacies.branches_of_owner(owner_id).await?)
    }

    /// Open a branch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a bad name or coordinates.
    pub async fn create_branch(
        &self,
        owner_id: PharmacyOwnerId,
        input: &NewBranchInput,
    ) -> Result<PharmacyBranch> {
        let name = validate_name(&input.name, PLACE_NAME_MIN, PLACE_NAME_MAX)?;
        let location = Coordinates::new(input.latitude, input.longitude)?;

        let branch = self
            .pharmacies
            .create_branch(owner_id, name, location)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    AppError::NotFound("pharmacy does not exist".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(branch_id = %branch.id, %owner_id, "branch opened");
        Ok(branch)
    }

    /// Pharmacists across the owner's branches.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn pharmacists(&self, owner_id: PharmacyOwnerId) -> Result<Vec<Pharmacist>> {
        Ok(self.pharmacies.pharmacists_of_owner(owner_id).await?)
    }

    /// Hire a pharmacist at one of the owner's branches.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the branch is not the owner's.
    /// Returns `AuthError` variants for a bad email or password, or a taken email.
    pub async fn create_pharmacist(
        &self,
        owner_id: PharmacyOwnerId,
        input: &NewPharmacistInput,
    ) -> Result<Pharmacist> {
        let first_name = validate_name(&input.first_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?;
        let last_name = validate_name(&input.last_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?;
        let email = Email::parse(&input.email)?;
        let password_hash = hash_new_password(&input.password)?;

        let pharmacist = self
            .pharmacies
            .create_pharmacist(
                owner_id,
                NewPharmacist {
                    first_name,
                    last_name,
                    branch_id: input.branch_id,
                    email: &email,
                    password_hash: &password_hash,
                },
            )
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AppError::NotFound("branch does not exist".to_string()),
                other => AuthError::from_create(other).into(),
            })?;

        tracing::info!(pharmacist_id = %pharmacist.id, %owner_id, "pharmacist hired");
        Ok(pharmacist)
    }

    // =========================================================================
    // Pharmacists
    // =========================================================================

    /// The logged-in pharmacist's account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the account no longer exists.
    pub async fn pharmacist_profile(&self, id: PharmacistId) -> Result<Pharmacist> {
        self.pharmacies
            .get_pharmacist(id)
            .await?
            .ok_or_else(|| AuthError::SessionExpired.into())
    }

    async fn branch(&self, pharmacist_id: PharmacistId) -> Result<PharmacyBranchId> {
        self.pharmacies
            .branch_of_pharmacist(pharmacist_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::SessionExpired.into(),
                other => other.into(),
            })
    }

    /// Prescriptions of the citizen with this UCN that can be dispensed now.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed UCN.
    /// Returns `AppError::NotFound` if no citizen has it.
    pub async fn dispensable_prescriptions(
        &self,
        ucn: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Prescription>> {
        let ucn = Ucn::parse(ucn)?;
        let citizen = self
            .citizens
            .get_by_ucn(&ucn)
            .await?
            .ok_or_else(|| AppError::NotFound("citizen does not exist".to_string()))?;

        let mut prescriptions = self
            .prescriptions
            .list_for_citizen(citizen.id, Some(PrescriptionState::Active))
            .await?;
        prescriptions.retain(|p| p.is_dispensable(now));
        Ok(prescriptions)
    }

    /// Dispense whole prescriptions from the pharmacist's branch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an empty or repeated list.
    /// Returns a conflict if any prescription cannot be dispensed or the
    /// branch runs short; nothing is dispensed then.
    pub async fn fulfill(
        &self,
        pharmacist_id: PharmacistId,
        input: &FulfillInput,
        now: DateTime<Utc>,
    ) -> Result<Vec<Prescription>> {
        let requests = dispense_requests(input)?;
        self.dispense(pharmacist_id, &requests, now).await
    }

    /// Dispense selected line items from the pharmacist's branch.
    ///
    /// # Errors
    ///
    /// Same as [`PharmacyService::fulfill`], plus a conflict for items that
    /// are not pending.
    pub async fn fulfill_medicaments(
        &self,
        pharmacist_id: PharmacistId,
        input: &FulfillItemsInput,
        now: DateTime<Utc>,
    ) -> Result<Vec<Prescription>> {
        let requests = dispense_item_requests(input)?;
        self.dispense(pharmacist_id, &requests, now).await
    }

    async fn dispense(
        &self,
        pharmacist_id: PharmacistId,
        requests: &[(PrescriptionId, Dispense)],
        now: DateTime<Utc>,
    ) -> Result<Vec<Prescription>> {
        let branch_id = self.branch(pharmacist_id).await?;

        let dispensed = self
            .prescriptions
            .dispense(branch_id, requests, now)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    AppError::NotFound("prescription does not exist".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(
            %pharmacist_id,
            %branch_id,
            prescriptions = dispensed.len(),
            "prescriptions dispensed"
        );
        Ok(dispensed)
    }

    /// Stock of the pharmacist's branch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn storage(&self, pharmacist_id: PharmacistId) -> Result<Vec<StorageItem>> {
        let branch_id = self.branch(pharmacist_id).await?;
        Ok(self.pharmacies.storage(branch_id).await?)
    }

    /// Add delivered stock to the pharmacist's branch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for empty, repeated or non-positive items.
    /// Returns a conflict for unknown medicaments.
    pub async fn add_storage(
        &self,
        pharmacist_id: PharmacistId,
        input: &StorageInput,
    ) -> Result<Vec<StorageItem>> {
        let items = storage_items(input)?;
        let branch_id = self.branch(pharmacist_id).await?;

        let storage = self.pharmacies.add_storage(branch_id, &items).await?;
        tracing::info!(%pharmacist_id, %branch_id, items = items.len(), "stock added");
        Ok(storage)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dispense_requests() {
        let a = PrescriptionId::generate();
        let b = PrescriptionId::generate();

        let requests = dispense_requests(&FulfillInput {
            prescription_ids: vec![a, b],
        })
        .unwrap();
        assert_eq!(requests.len(), 2);
        assert!(matches!(requests[0], (id, Dispense::All) if id == a));

        assert!(dispense_requests(&FulfillInput {
            prescription_ids: vec![]
        })
        .is_err());
        assert!(dispense_requests(&FulfillInput {
            prescription_ids: vec![a, a]
        })
        .is_err());
    }

    #[test]
    fn test_dispense_item_requests() {
        let p = PrescriptionId::generate();
        let m = MedicamentId::generate();
        let entry = |ids: Vec<MedicamentId>| FulfillItemsEntry {
            prescription_id: p,
            medicament_ids: ids,
        };

        let requests = dispense_item_requests(&FulfillItemsInput {
            prescriptions: vec![entry(vec![m])],
        })
        .unwrap();
        assert!(matches!(&requests[0].1, Dispense::Items(ids) if ids == &vec![m]));

        assert!(dispense_item_requests(&FulfillItemsInput {
            prescriptions: vec![entry(vec![])]
        })
        .is_err());
        assert!(dispense_item_requests(&FulfillItemsInput {
            prescriptions: vec![entry(vec![m, m])]
        })
        .is_err());
        assert!(dispense_item_requests(&FulfillItemsInput {
            prescriptions: vec![entry(vec![m]), entry(vec![m])]
        })
        .is_err());
    }

    #[test]
    fn test_storage_items() {
        let m = MedicamentId::generate();
        let entry = |quantity| StorageEntry {
            medicament_id: m,
            quantity,
        };

        assert_eq!(
            storage_items(&StorageInput {
                medicaments: vec![entry(5)]
            })
            .unwrap(),
            vec![(m, 5)]
        );
        assert!(storage_items(&StorageInput {
            medicaments: vec![entry(0)]
        })
        .is_err());
        assert!(storage_items(&StorageInput {
            medicaments: vec![entry(1), entry(2)]
        })
        .is_err());
        assert!(storage_items(&StorageInput {
            medicaments: vec![]
        })
        .is_err());
    }
}
