//! Medicament domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use medico_core::{AtcCode, MedicamentId};

/// A registered medicament.
#[derive(Debug, Clone, Serialize)]
pub struct Medicament {
    pub id: MedicamentId,
    pub official_name: String,
    pub active_ingredients: Vec<String>,
    pub atc: AtcCode,
    pub requires_prescription: bool,
    pub created_at: DateTime<Utc>,
}

/// Row of a medicament name search.
#[derive(Debug, Clone, Serialize)]
pub struct MedicamentSummary {
    pub id: MedicamentId,
    pub official_name: String,
}
