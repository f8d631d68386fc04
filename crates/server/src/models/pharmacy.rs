//! Pharmacy brands, branches, staff and storage.

use chrono::{DateTime, Utc};
use serde::Serialize;

use medico_core::{
    Coordinates, Email, MedicamentId, PharmacistId, PharmacyBranchId, PharmacyBrandId,
    PharmacyOwnerId,
};

/// The account that runs a pharmacy brand.
#[derive(Debug, Clone, Serialize)]
pub struct PharmacyOwner {
    pub id: PharmacyOwnerId,
    pub name: String,
    pub email: Email,
}

/// A pharmacy chain.
#[derive(Debug, Clone, Serialize)]
pub struct PharmacyBrand {
    pub id: PharmacyBrandId,
    pub name: String,
    pub owner: PharmacyOwner,
    pub branch_count: i64,
    pub created_at: DateTime<Utc>,
}

/// One physical pharmacy of a brand.
#[derive(Debug, Clone, Serialize)]
pub struct PharmacyBranch {
    pub id: PharmacyBranchId,
    pub brand_id: PharmacyBrandId,
    pub name: String,
    #[serde(flatten)]
    pub location: Coordinates,
}

/// A pharmacist working at a branch.
#[derive(Debug, Clone, Serialize)]
pub struct Pharmacist {
    pub id: PharmacistId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub branch_id: PharmacyBranchId,
}

/// Stock of one medicament at a branch.
#[derive(Debug, Clone, Serialize)]
pub struct StorageItem {
    pub medicament_id: MedicamentId,
    pub official_name: String,
    pub quantity: i32,
}

/// A branch able to dispense a whole prescription.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableBranch {
    pub id: PharmacyBranchId,
    pub brand: String,
    pub name: String,
    #[serde(flatten)]
    pub location: Coordinates,
}
