//! Doctor and hospital domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use medico_core::{DoctorId, Email, HospitalId, Uin};

/// A doctor.
#[derive(Debug, Clone, Serialize)]
pub struct Doctor {
    pub id: DoctorId,
    pub first_name: String,
    pub second_name: String,
    pub last_name: String,
    pub uin: Uin,
    pub email: Email,
    pub hospital_id: Option<HospitalId>,
    /// Name of the hospital, when the doctor is attached to one.
    pub hospital: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    /// First and last name joined for display.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A hospital doctors can be attached to.
#[derive(Debug, Clone, Serialize)]
pub struct Hospital {
    pub id: HospitalId,
    pub name: String,
    pub city: String,
    pub address: String,
}
