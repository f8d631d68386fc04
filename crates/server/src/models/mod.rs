//! Domain models for the Medico API.
//!
//! Repositories map database rows into these types; handlers serialize
//! them straight into JSON responses.

pub mod account;
pub mod citizen;
pub mod doctor;
pub mod medicament;
pub mod pharmacy;
pub mod prescription;

pub use account::{Admin, Credentials, Moderator};
pub use citizen::{Citizen, CitizenSummary, MedicalInfo};
pub use doctor::{Doctor, Hospital};
pub use medicament::{Medicament, MedicamentSummary};
pub use pharmacy::{
    AvailableBranch, Pharmacist, PharmacyBranch, PharmacyBrand, PharmacyOwner, StorageItem,
};
pub use prescription::{Prescription, PrescriptionItem};
