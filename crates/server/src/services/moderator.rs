//! Moderator service: directory management of doctors, citizens,
//! medicaments and pharmacies.
//!
//! Which moderator may call what is decided by the route extractor; this
//! service only validates and persists. Deleting an account also ends every
//! session it holds.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use medico_core::{
    AtcCode, CitizenId, DoctorId, Email, HospitalId, MedicamentId, PharmacyBrandId, Role, Ucn, Uin,
    validate_name,
};

use super::auth::{AuthError, hash_new_password};
use super::session::SessionStore;
use super::{ADDRESS_MAX, PERSON_NAME_MAX, PERSON_NAME_MIN, PLACE_NAME_MAX, PLACE_NAME_MIN};
use crate::db::citizens::CitizenFields;
use crate::db::doctors::DoctorFields;
use crate::db::medicaments::MedicamentFields;
use crate::db::pharmacies::PharmacyFields;
use crate::db::{
    CitizenRepository, DoctorRepository, MedicamentRepository, PharmacyRepository, RepositoryError,
};
use crate::error::{AppError, Result};
use crate::models::{Citizen, Doctor, Medicament, PharmacyBrand};

const MEDICAMENT_NAME_MAX: usize = 128;

/// Doctor fields sent by a moderator. The password is required on create.
#[derive(Debug, Deserialize)]
pub struct DoctorInput {
    pub first_name: String,
    pub second_name: String,
    pub last_name: String,
    pub uin: String,
    pub email: String,
    pub password: Option<String>,
    pub hospital_id: Option<HospitalId>,
}

/// Citizen fields sent by a moderator. The password is required on create.
#[derive(Debug, Deserialize)]
pub struct CitizenInput {
    pub first_name: String,
    pub second_name: String,
    pub last_name: String,
    pub ucn: String,
    pub birth_date: NaiveDate,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub address: String,
    pub city: String,
    pub email: String,
    pub password: Option<String>,
    pub personal_doctor_id: Option<DoctorId>,
}

/// Medicament fields sent by a moderator.
#[derive(Debug, Deserialize)]
pub struct MedicamentInput {
    pub official_name: String,
    #[serde(default)]
    pub active_ingredients: Vec<String>,
    pub atc: String,
    #[serde(default = "default_requires_prescription")]
    pub requires_prescription: bool,
}

const fn default_requires_prescription() -> bool {
    true
}

/// Pharmacy fields sent by a moderator. The owner password is required on
/// create.
#[derive(Debug, Deserialize)]
pub struct PharmacyInput {
    pub name: String,
    pub owner_name: String,
    pub owner_email: String,
    pub owner_password: Option<String>,
}

fn required_password(password: Option<&String>) -> Result<String> {
    let password =
        password.ok_or_else(|| AppError::BadRequest("password is required".to_string()))?;
    Ok(hash_new_password(password)?)
}

fn optional_password(password: Option<&String>) -> Result<Option<String>> {
    password.map(|p| hash_new_password(p)).transpose().map_err(Into::into)
}

fn positive(value: Option<f64>, what: &str) -> Result<Option<f64>> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => {
            Err(AppError::BadRequest(format!("{what} must be a positive number")))
        }
        other => Ok(other),
    }
}

fn ingredients(input: &MedicamentInput) -> Result<Vec<String>> {
    input
        .active_ingredients
        .iter()
        .map(|i| {
            validate_name(i, 1, MEDICAMENT_NAME_MAX)
                .map(str::to_owned)
                .map_err(|_| AppError::BadRequest("active ingredient must not be empty".to_string()))
        })
        .collect()
}

fn not_found(what: &'static str) -> impl Fn(RepositoryError) -> AppError {
    move |e| match e {
        RepositoryError::NotFound => AppError::NotFound(format!("{what} does not exist")),
        other => AuthError::from_create(other).into(),
    }
}

/// Moderator service.
pub struct ModeratorService<'a> {
    doctors: DoctorRepository<'a>,
    citizens: CitizenRepository<'a>,
    medicaments: MedicamentRepository<'a>,
    pharmacies: PharmacyRepository<'a>,
    sessions: &'a SessionStore,
}

impl<'a> ModeratorService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, sessions: &'a SessionStore) -> Self {
        Self {
            doctors: DoctorRepository::new(pool),
            citizens: CitizenRepository::new(pool),
            medicaments: MedicamentRepository::new(pool),
            pharmacies: PharmacyRepository::new(pool),
            sessions,
        }
    }

    // =========================================================================
    // Doctors
    // =========================================================================

    /// All doctors.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn doctors(&self) -> Result<Vec<Doctor>> {
        Ok(self.doctors.list().await?)
    }

    /// One doctor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no doctor has this ID.
    pub async fn doctor(&self, id: DoctorId) -> Result<Doctor> {
        self.doctors
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("doctor does not exist".to_string()))
    }

    /// Register a doctor with login credentials.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields.
    /// Returns a conflict for a taken UIN or email, or an unknown hospital.
    pub async fn create_doctor(&self, input: &DoctorInput) -> Result<Doctor> {
        let uin = Uin::parse(&input.uin)?;
        let email = Email::parse(&input.email)?;
        let password_hash = required_password(input.password.as_ref())?;
        let fields = doctor_fields(input, &uin, &email)?;

        let doctor = self
            .doctors
            .create(&fields, &password_hash)
            .await
            .map_err(not_found("doctor"))?;

        tracing::info!(doctor_id = %doctor.id, "doctor created");
        Ok(doctor)
    }

    /// Update a doctor; the password only changes when given.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no doctor has this ID.
    pub async fn update_doctor(&self, id: DoctorId, input: &DoctorInput) -> Result<Doctor> {
        let uin = Uin::parse(&input.uin)?;
        let email = Email::parse(&input.email)?;
        let password_hash = optional_password(input.password.as_ref())?;
        let fields = doctor_fields(input, &uin, &email)?;

        let doctor = self
            .doctors
            .update(id, &fields, password_hash.as_deref())
            .await
            .map_err(not_found("doctor"))?;

        tracing::info!(doctor_id = %id, "doctor updated");
        Ok(doctor)
    }

    /// Delete a doctor and end their sessions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no doctor has this ID.
    /// Returns a conflict if the doctor has issued prescriptions.
    pub async fn delete_doctor(&self, id: DoctorId) -> Result<()> {
        self.doctors.delete(id).await.map_err(not_found("doctor"))?;
        self.sessions.revoke_user(Role::Doctor, *id.as_uuid()).await;

        tracing::info!(doctor_id = %id, "doctor deleted");
        Ok(())
    }

    // =========================================================================
    // Citizens
    // =========================================================================

    /// All citizens.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn citizens(&self) -> Result<Vec<Citizen>> {
        Ok(self.citizens.list().await?)
    }

    /// One citizen.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no citizen has this ID.
    pub async fn citizen(&self, id: CitizenId) -> Result<Citizen> {
        self.citizens
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("citizen does not exist".to_string()))
    }

    /// Register a citizen with login credentials.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields.
    /// Returns a conflict for a taken UCN or email, or an unknown personal
    /// doctor.
    pub async fn create_citizen(&self, input: &CitizenInput) -> Result<Citizen> {
        let ucn = Ucn::parse(&input.ucn)?;
        let email = Email::parse(&input.email)?;
        let password_hash = required_password(input.password.as_ref())?;
        let fields = citizen_fields(input, &ucn, &email)?;

        let citizen = self
            .citizens
            .create(&fields, &password_hash)
            .await
            .map_err(not_found("citizen"))?;

        tracing::info!(citizen_id = %citizen.id, "citizen created");
        Ok(citizen)
    }

    /// Update a citizen; the password only changes when given.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no citizen has this ID.
    pub async fn update_citizen(&self, id: CitizenId, input: &CitizenInput) -> Result<Citizen> {
        let ucn = Ucn::parse(&input.ucn)?;
        let email = Email::parse(&input.email)?;
        let password_hash = optional_password(input.password.as_ref())?;
        let fields = citizen_fields(input, &ucn, &email)?;

        let citizen = self
            .citizens
            .update(id, &fields, password_hash.as_deref())
            .await
            .map_err(not_found("citizen"))?;

        tracing::info!(citizen_id = %id, "citizen updated");
        Ok(citizen)
    }

    /// Delete a citizen with their prescriptions and end their sessions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no citizen has this ID.
    pub async fn delete_citizen(&self, id: CitizenId) -> Result<()> {
        self.citizens.delete(id).await.map_err(not_found("citizen"))?;
        self.sessions.revoke_user(Role::Citizen, *id.as_uuid()).await;

        tracing::info!(citizen_id = %id, "citizen deleted");
        Ok(())
    }

    // =========================================================================
    // Medicaments
    // =========================================================================

    /// All medicaments.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn medicaments(&self) -> Result<Vec<Medicament>> {
        Ok(self.medicaments.list().await?)
    }

    /// One medicament.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no medicament has this ID.
    pub async fn medicament(&self, id: MedicamentId) -> Result<Medicament> {
        self.medicaments
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("medicament does not exist".to_string()))
    }

    /// Register a medicament.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields.
    pub async fn create_medicament(&self, input: &MedicamentInput) -> Result<Medicament> {
        let official_name =
            validate_name(&input.official_name, PERSON_NAME_MIN, MEDICAMENT_NAME_MAX)?;
        let atc = AtcCode::parse(&input.atc)?;
        let active_ingredients = ingredients(input)?;

        let medicament = self
            .medicaments
            .create(&MedicamentFields {
                official_name,
                active_ingredients: &active_ingredients,
                atc: &atc,
                requires_prescription: input.requires_prescription,
            })
            .await?;

        tracing::info!(medicament_id = %medicament.id, "medicament created");
        Ok(medicament)
    }

    /// Update a medicament.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no medicament has this ID.
    pub async fn update_medicament(
        &self,
        id: MedicamentId,
        input: &MedicamentInput,
    ) -> Result<Medicament> {
        let official_name =
            validate_name(&input.official_name, PERSON_NAME_MIN, MEDICAMENT_NAME_MAX)?;
        let atc = AtcCode::parse(&input.atc)?;
        let active_ingredients = ingredients(input)?;

        let medicament = self
            .medicaments
            .update(
                id,
                &MedicamentFields {
                    official_name,
                    active_ingredients: &active_ingredients,
                    atc: &atc,
                    requires_prescription: input.requires_prescription,
                },
            )
            .await
            .map_err(not_found("medicament"))?;

        tracing::info!(medicament_id = %id, "medicament updated");
        Ok(medicament)
    }

    /// Delete a medicament and all stock of it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no medicament has this ID.
    /// Returns a conflict if a prescription lists it.
    pub async fn delete_medicament(&self, id: MedicamentId) -> Result<()> {
        self.medicaments
            .delete(id)
            .await
            .map_err(not_found("medicament"))?;

        tracing::info!(medicament_id = %id, "medicament deleted");
        Ok(())
    }

    // =========================================================================
    // Pharmacies
    // =========================================================================

    /// All pharmacy brands with their owners.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn pharmacies(&self) -> Result<Vec<PharmacyBrand>> {
        Ok(self.pharmacies.list_brands().await?)
    }

    /// One pharmacy brand.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no brand has this ID.
    pub async fn pharmacy(&self, id: PharmacyBrandId) -> Result<PharmacyBrand> {
        self.pharmacies
            .get_brand(id)
            .await?
            .ok_or_else(|| AppError::NotFound("pharmacy does not exist".to_string()))
    }

    /// Register a pharmacy brand together with its owner account.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields.
    /// Returns a conflict for a taken brand name or owner email.
    pub async fn create_pharmacy(&self, input: &PharmacyInput) -> Result<PharmacyBrand> {
        let owner_email = Email::parse(&input.owner_email)?;
        let password_hash = required_password(input.owner_password.as_ref())?;
        let fields = pharmacy_fields(input, &owner_email)?;

        let brand = self
            .pharmacies
            .create_brand(&fields, &password_hash)
            .await
            .map_err(not_found("pharmacy"))?;

        tracing::info!(brand_id = %brand.id, owner_id = %brand.owner.id, "pharmacy created");
        Ok(brand)
    }

    /// Update a pharmacy brand and its owner; the owner password only changes
    /// when given.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no brand has this ID.
    pub async fn update_pharmacy(
        &self,
        id: PharmacyBrandId,
        input: &PharmacyInput,
    ) -> Result<PharmacyBrand> {
        let owner_email = Email::parse(&input.owner_email)?;
        let password_hash = optional_password(input.owner_password.as_ref())?;
        let fields = pharmacy_fields(input, &owner_email)?;

        let brand = self
            .pharmacies
            .update_brand(id, &fields, password_hash.as_deref())
            .await
            .map_err(not_found("pharmacy"))?;

        tracing::info!(brand_id = %id, "pharmacy updated");
        Ok(brand)
    }

    /// Delete a pharmacy brand, its owner, branches and pharmacists, and end
    /// every session those accounts hold.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no brand has this ID.
    pub async fn delete_pharmacy(&self, id: PharmacyBrandId) -> Result<()> {
        let deleted = self
            .pharmacies
            .delete_brand(id)
            .await
            .map_err(not_found("pharmacy"))?;

        self.sessions
            .revoke_user(Role::PharmacyOwner, *deleted.owner_id.as_uuid())
            .await;
        for pharmacist_id in &deleted.pharmacist_ids {
            self.sessions
                .revoke_user(Role::Pharmacist, *pharmacist_id.as_uuid())
                .await;
        }

        tracing::info!(
            brand_id = %id,
            pharmacists = deleted.pharmacist_ids.len(),
            "pharmacy deleted"
        );
        Ok(())
    }
}

fn doctor_fields<'a>(
    input: &'a DoctorInput,
    uin: &'a Uin,
    email: &'a Email,
) -> Result<DoctorFields<'a>> {
    Ok(DoctorFields {
        first_name: validate_name(&input.first_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?,
        second_name: validate_name(&input.second_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?,
        last_name: validate_name(&input.last_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?,
        uin,
        email,
        hospital_id: input.hospital_id,
    })
}

fn citizen_fields<'a>(
    input: &'a CitizenInput,
    ucn: &'a Ucn,
    email: &'a Email,
) -> Result<CitizenFields<'a>> {
    if input.birth_date > Utc::now().date_naive() {
        return Err(AppError::BadRequest(
            "birth date must not be in the future".to_string(),
        ));
    }

    Ok(CitizenFields {
        first_name: validate_name(&input.first_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?,
        second_name: validate_name(&input.second_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?,
        last_name: validate_name(&input.last_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?,
        ucn,
        birth_date: input.birth_date,
        height_cm: positive(input.height_cm, "height")?,
        weight_kg: positive(input.weight_kg, "weight")?,
        address: validate_name(&input.address, PLACE_NAME_MIN, ADDRESS_MAX)?,
        city: validate_name(&input.city, PLACE_NAME_MIN, PLACE_NAME_MAX)?,
        email,
        personal_doctor_id: input.personal_doctor_id,
    })
}

fn pharmacy_fields<'a>(
    input: &'a PharmacyInput,
    owner_email: &'a Email,
) -> Result<PharmacyFields<'a>> {
    Ok(PharmacyFields {
        name: validate_name(&input.name, PLACE_NAME_MIN, PLACE_NAME_MAX)?,
        owner_name: validate_name(&input.owner_name, PERSON_NAME_MIN, PERSON_NAME_MAX)?,
        owner_email,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn citizen_input() -> CitizenInput {
        CitizenInput {
            first_name: "Maria".to_string(),
            second_name: "Ivanova".to_string(),
            last_name: "Petrova".to_string(),
            ucn: "9001011234".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            height_cm: Some(168.0),
            weight_kg: None,
            address: "12 Vitosha Blvd".to_string(),
            city: "Sofia".to_string(),
            email: "maria@example.bg".to_string(),
            password: None,
            personal_doctor_id: None,
        }
    }

    #[test]
    fn test_citizen_fields() {
        let input = citizen_input();
        let ucn = Ucn::parse(&input.ucn).unwrap();
        let email = Email::parse(&input.email).unwrap();

        let fields = citizen_fields(&input, &ucn, &email).unwrap();
        assert_eq!(fields.city, "Sofia");
        assert_eq!(fields.height_cm, Some(168.0));
    }

    #[test]
    fn test_citizen_fields_rejects_bad_measurements() {
        let mut input = citizen_input();
        input.weight_kg = Some(-3.0);
        let ucn = Ucn::parse(&input.ucn).unwrap();
        let email = Email::parse(&input.email).unwrap();

        assert!(matches!(
            citizen_fields(&input, &ucn, &email),
            Err(AppError::BadRequest(msg)) if msg == "weight must be a positive number"
        ));
    }

    #[test]
    fn test_citizen_fields_rejects_future_birth_date() {
        let mut input = citizen_input();
        input.birth_date = Utc::now().date_naive() + chrono::Days::new(2);
        let ucn = Ucn::parse(&input.ucn).unwrap();
        let email = Email::parse(&input.email).unwrap();

        assert!(citizen_fields(&input, &ucn, &email).is_err());
    }

    #[test]
    fn test_password_is_required_on_create() {
        assert!(matches!(
            required_password(None),
            Err(AppError::BadRequest(msg)) if msg == "password is required"
        ));
        assert!(optional_password(None).unwrap().is_none());
        assert!(optional_password(Some(&"Correct.Horse.42".to_string()))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_medicament_input_defaults() {
        let input: MedicamentInput =
            serde_json::from_str(r#"{"official_name": "Aspirin", "atc": "N02BA01"}"#).unwrap();
        assert!(input.requires_prescription);
        assert!(input.active_ingredients.is_empty());
    }

    #[test]
    fn test_blank_ingredient_rejected() {
        let input = MedicamentInput {
            official_name: "Aspirin".to_string(),
            active_ingredients: vec!["acetylsalicylic acid".to_string(), "  ".to_string()],
            atc: "N02BA01".to_string(),
            requires_prescription: false,
        };
        assert!(ingredients(&input).is_err());
    }
}
