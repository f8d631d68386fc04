//! Citizen domain types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use medico_core::{CitizenId, DoctorId, Email, Ucn};

/// A citizen as seen by moderators.
#[derive(Debug, Clone, Serialize)]
pub struct Citizen {
    pub id: CitizenId,
    pub first_name: String,
    pub second_name: String,
    pub last_name: String,
    pub ucn: Ucn,
    pub birth_date: NaiveDate,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub address: String,
    pub city: String,
    pub email: Email,
    pub personal_doctor_id: Option<DoctorId>,
    pub created_at: DateTime<Utc>,
}

impl Citizen {
    /// The slice of the record a citizen and their doctors may read.
    #[must_use]
    pub fn medical_info(&self) -> MedicalInfo {
        MedicalInfo {
            id: self.id,
            first_name: self.first_name.clone(),
            second_name: self.second_name.clone(),
            last_name: self.last_name.clone(),
            ucn: self.ucn.clone(),
            birth_date: self.birth_date,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            email: self.email.clone(),
        }
    }
}

/// Medical record header of a citizen.
#[derive(Debug, Clone, Serialize)]
pub struct MedicalInfo {
    pub id: CitizenId,
    pub first_name: String,
    pub second_name: String,
    pub last_name: String,
    pub ucn: Ucn,
    pub birth_date: NaiveDate,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub email: Email,
}

/// Row of a UCN prefix search.
#[derive(Debug, Clone, Serialize)]
pub struct CitizenSummary {
    pub id: CitizenId,
    pub first_name: String,
    pub last_name: String,
    pub ucn: Ucn,
}
