//! Citizen service: a citizen's own records.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use medico_core::{CitizenId, MedicamentId, PrescriptionId};

use super::auth::AuthError;
use crate::db::{CitizenRepository, DoctorRepository, PharmacyRepository, PrescriptionRepository};
use crate::error::{AppError, Result};
use crate::models::{AvailableBranch, Citizen, Doctor, MedicalInfo, Prescription};

/// Citizen service.
pub struct CitizenService<'a> {
    citizens: CitizenRepository<'a>,
    doctors: DoctorRepository<'a>,
    pharmacies: PharmacyRepository<'a>,
    prescriptions: PrescriptionRepository<'a>,
}

impl<'a> CitizenService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            citizens: CitizenRepository::new(pool),
            doctors: DoctorRepository::new(pool),
            pharmacies: PharmacyRepository::new(pool),
            prescriptions: PrescriptionRepository::new(pool),
        }
    }

    /// The logged-in citizen's profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the account no longer exists.
    pub async fn profile(&self, id: CitizenId) -> Result<Citizen> {
        self.citizens
            .get(id)
            .await?
            .ok_or_else(|| AuthError::SessionExpired.into())
    }

    /// Height, weight and birth date.
    ///
    /// # Errors
    ///
    /// Same as [`CitizenService::profile`].
    pub async fn medical_info(&self, id: CitizenId) -> Result<MedicalInfo> {
        Ok(self.profile(id).await?.medical_info())
    }

    /// The citizen's personal doctor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the citizen has none.
    pub async fn personal_doctor(&self, id: CitizenId) -> Result<Doctor> {
        let no_doctor = || AppError::NotFound("citizen has no personal doctor".to_string());

        let doctor_id = self.profile(id).await?.personal_doctor_id.ok_or_else(no_doctor)?;
        self.doctors.get(doctor_id).await?.ok_or_else(no_doctor)
    }

    /// All of the citizen's prescriptions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn prescriptions(&self, id: CitizenId) -> Result<Vec<Prescription>> {
        Ok(self.prescriptions.list_for_citizen(id, None).await?)
    }

    /// Branches holding enough stock for every pending item of one of the
    /// citizen's active prescriptions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the prescription is not the citizen's.
    /// Returns `AppError::Conflict` if it can no longer be dispensed.
    pub async fn available_pharmacies(
        &self,
        id: CitizenId,
        prescription_id: PrescriptionId,
        now: DateTime<Utc>,
    ) -> Result<Vec<AvailableBranch>> {
        let prescription = self
            .prescriptions
            .get(prescription_id)
            .await?
            .filter(|p| p.citizen_id == id)
            .ok_or_else(|| AppError::NotFound("prescription does not exist".to_string()))?;

        if !prescription.is_dispensable(now) {
            return Err(AppError::Conflict(
                "prescription is not active".to_string(),
            ));
        }

        let pending: Vec<(MedicamentId, i32)> = prescription
            .pending_items()
            .map(|item| (item.medicament_id, item.quantity))
            .collect();
        Ok(self.pharmacies.branches_covering(&pending).await?)
    }
}
