//! Prescription domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use medico_core::{CitizenId, DoctorId, MedicamentId, PrescriptionId, PrescriptionState};

/// A prescription with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct Prescription {
    pub id: PrescriptionId,
    pub name: String,
    pub doctor_id: DoctorId,
    pub doctor_name: String,
    pub citizen_id: CitizenId,
    pub state: PrescriptionState,
    pub created_at: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub medicaments: Vec<PrescriptionItem>,
}

impl Prescription {
    /// Whether the prescription can still be dispensed at `now`.
    #[must_use]
    pub fn is_dispensable(&self, now: DateTime<Utc>) -> bool {
        self.state.can_fulfill() && self.end_date >= now
    }

    /// Line items not handed out yet.
    pub fn pending_items(&self) -> impl Iterator<Item = &PrescriptionItem> {
        self.medicaments.iter().filter(|item| !item.fulfilled)
    }
}

/// One medicament on a prescription.
#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionItem {
    pub medicament_id: MedicamentId,
    pub official_name: String,
    pub quantity: i32,
    pub fulfilled: bool,
}
