//! Doctor service: citizen lookup and prescriptions.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use medico_core::{CitizenId, DoctorId, MedicamentId, PrescriptionId, Ucn, validate_name};

use super::auth::AuthError;
use crate::db::prescriptions::NewPrescription;
use crate::db::{
    CitizenRepository, DoctorRepository, MedicamentRepository, PrescriptionRepository,
    RepositoryError,
};
use crate::error::{AppError, Result};
use crate::models::{Citizen, CitizenSummary, Doctor, MedicamentSummary, Prescription};

const PRESCRIPTION_NAME_MIN: usize = 3;
const PRESCRIPTION_NAME_MAX: usize = 32;

/// One line of a new prescription.
#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionItemInput {
    pub medicament_id: MedicamentId,
    pub quantity: i32,
}

/// Request body for a new prescription.
#[derive(Debug, Deserialize)]
pub struct NewPrescriptionInput {
    pub citizen_id: CitizenId,
    pub name: String,
    pub end_date: DateTime<Utc>,
    pub medicaments: Vec<PrescriptionItemInput>,
}

/// Check everything about a new prescription that needs no database.
///
/// Returns the trimmed name and the line items.
fn validate_prescription(
    input: &NewPrescriptionInput,
    now: DateTime<Utc>,
) -> Result<(&str, Vec<(MedicamentId, i32)>)> {
    let name = validate_name(&input.name, PRESCRIPTION_NAME_MIN, PRESCRIPTION_NAME_MAX)
        .map_err(|_| {
            AppError::BadRequest(format!(
                "prescription name must contain between {PRESCRIPTION_NAME_MIN} and {PRESCRIPTION_NAME_MAX} characters"
            ))
        })?;

    if input.end_date <= now {
        return Err(AppError::BadRequest(
            "end date must be in the future".to_string(),
        ));
    }
    if input.medicaments.is_empty() {
        return Err(AppError::BadRequest(
            "prescription must contain at least one medicament".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(input.medicaments.len());
    let mut items = Vec::with_capacity(input.medicaments.len());
    for item in &input.medicaments {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(
                "medicament quantity must be positive".to_string(),
            ));
        }
        if !seen.insert(item.medicament_id) {
            return Err(AppError::BadRequest(format!(
                "medicament {} is listed twice",
                item.medicament_id
            )));
        }
        items.push((item.medicament_id, item.quantity));
    }

    Ok((name, items))
}

/// Doctor service.
pub struct DoctorService<'a> {
    doctors: DoctorRepository<'a>,
    citizens: CitizenRepository<'a>,
    medicaments: MedicamentRepository<'a>,
    prescriptions: PrescriptionRepository<'a>,
}

impl<'a> DoctorService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            doctors: DoctorRepository::new(pool),
            citizens: CitizenRepository::new(pool),
            medicaments: MedicamentRepository::new(pool),
            prescriptions: PrescriptionRepository::new(pool),
        }
    }

    /// The logged-in doctor's profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the account no longer exists.
    pub async fn profile(&self, id: DoctorId) -> Result<Doctor> {
        self.doctors
            .get(id)
            .await?
            .ok_or_else(|| AuthError::SessionExpired.into())
    }

    /// A citizen by exact UCN.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed UCN.
    /// Returns `AppError::NotFound` if no citizen has it.
    pub async fn citizen_by_ucn(&self, ucn: &str) -> Result<Citizen> {
        let ucn = Ucn::parse(ucn)?;
        self.citizens
            .get_by_ucn(&ucn)
            .await?
            .ok_or_else(|| AppError::NotFound("citizen does not exist".to_string()))
    }

    /// Citizens whose UCN starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` unless the prefix is 1 to 10 digits.
    pub async fn citizens_by_ucn_prefix(&self, prefix: &str) -> Result<Vec<CitizenSummary>> {
        let prefix = Ucn::prefix(prefix)?;
        Ok(self.citizens.search_by_ucn_prefix(prefix).await?)
    }

    /// Every prescription of a citizen.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the citizen does not exist.
    pub async fn citizen_prescriptions(&self, citizen_id: CitizenId) -> Result<Vec<Prescription>> {
        if self.citizens.get(citizen_id).await?.is_none() {
            return Err(AppError::NotFound("citizen does not exist".to_string()));
        }
        Ok(self
            .prescriptions
            .list_for_citizen(citizen_id, None)
            .await?)
    }

    /// Issue a prescription.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid name, end date or items.
    /// Returns `AppError::NotFound` if the citizen or a medicament does not
    /// exist.
    pub async fn create_prescription(
        &self,
        doctor_id: DoctorId,
        input: &NewPrescriptionInput,
        now: DateTime<Utc>,
    ) -> Result<Prescription> {
        let (name, items) = validate_prescription(input, now)?;

        if self.citizens.get(input.citizen_id).await?.is_none() {
            return Err(AppError::NotFound("citizen does not exist".to_string()));
        }

        let ids: Vec<MedicamentId> = items.iter().map(|(id, _)| *id).collect();
        let existing = self.medicaments.existing(&ids).await?;
        if let Some(missing) = ids.iter().find(|id| !existing.contains(id)) {
            return Err(AppError::NotFound(format!(
                "medicament {missing} does not exist"
            )));
        }

        let prescription = self
            .prescriptions
            .create(&NewPrescription {
                name,
                doctor_id,
                citizen_id: input.citizen_id,
                end_date: input.end_date,
                items: &items,
            })
            .await?;

        tracing::info!(
            prescription_id = %prescription.id,
            %doctor_id,
            citizen_id = %input.citizen_id,
            items = items.len(),
            "prescription issued"
        );
        Ok(prescription)
    }

    /// Withdraw one of the doctor's active prescriptions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the doctor issued no such prescription.
    /// Returns a conflict if it is no longer active.
    pub async fn invalidate_prescription(
        &self,
        doctor_id: DoctorId,
        prescription_id: PrescriptionId,
    ) -> Result<Prescription> {
        let prescription = self
            .prescriptions
            .invalidate(prescription_id, doctor_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    AppError::NotFound("prescription does not exist".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(%prescription_id, %doctor_id, "prescription invalidated");
        Ok(prescription)
    }

    /// Medicaments whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an empty prefix.
    pub async fn medicaments_by_name(&self, prefix: &str) -> Result<Vec<MedicamentSummary>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(AppError::BadRequest(
                "medicament name must not be empty".to_string(),
            ));
        }
        Ok(self.medicaments.search_by_name(prefix).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn input(name: &str, end_in: Duration, items: &[(MedicamentId, i32)]) -> NewPrescriptionInput {
        NewPrescriptionInput {
            citizen_id: CitizenId::generate(),
            name: name.to_string(),
            end_date: Utc::now() + end_in,
            medicaments: items
                .iter()
                .map(|(medicament_id, quantity)| PrescriptionItemInput {
                    medicament_id: *medicament_id,
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    fn bad_request(result: Result<(&str, Vec<(MedicamentId, i32)>)>) -> String {
        match result {
            Err(AppError::BadRequest(msg)) => msg,
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_prescription() {
        let a = MedicamentId::generate();
        let input = input("  Antibiotics ", Duration::days(7), &[(a, 2)]);

        let (name, items) = validate_prescription(&input, Utc::now()).unwrap();
        assert_eq!(name, "Antibiotics");
        assert_eq!(items, vec![(a, 2)]);
    }

    #[test]
    fn test_name_bounds() {
        let a = MedicamentId::generate();
        let now = Utc::now();

        let short = input("ab", Duration::days(1), &[(a, 1)]);
        assert!(bad_request(validate_prescription(&short, now)).contains("between 3 and 32"));

        let long = input(&"x".repeat(33), Duration::days(1), &[(a, 1)]);
        assert!(validate_prescription(&long, now).is_err());
    }

    #[test]
    fn test_end_date_must_be_in_the_future() {
        let a = MedicamentId::generate();
        let past = input("Painkillers", Duration::days(-1), &[(a, 1)]);
        assert_eq!(
            bad_request(validate_prescription(&past, Utc::now())),
            "end date must be in the future"
        );
    }

    #[test]
    fn test_items_are_checked() {
        let a = MedicamentId::generate();
        let now = Utc::now();

        let empty = input("Painkillers", Duration::days(1), &[]);
        assert!(bad_request(validate_prescription(&empty, now)).contains("at least one"));

        let zero = input("Painkillers", Duration::days(1), &[(a, 0)]);
        assert!(bad_request(validate_prescription(&zero, now)).contains("positive"));

        let twice = input("Painkillers", Duration::days(1), &[(a, 1), (a, 3)]);
        assert!(bad_request(validate_prescription(&twice, now)).contains("listed twice"));
    }
}
