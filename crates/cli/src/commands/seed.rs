//! Seed the database with demo data.
//!
//! Creates one account for every role so the API can be exercised by hand:
//! a hospital with a doctor, a citizen registered with that doctor, a few
//! medicaments, a pharmacy brand with one stocked branch and a pharmacist,
//! and one moderator per kind. All accounts share the password from
//! `MEDICO_SEED_PASSWORD`.
//!
//! Running it twice fails on the first duplicate email.

use chrono::NaiveDate;
use tracing::info;

use medico_core::{AtcCode, Coordinates, Email, ModeratorKind, Ucn, Uin};
use medico_server::db::citizens::CitizenFields;
use medico_server::db::doctors::DoctorFields;
use medico_server::db::medicaments::MedicamentFields;
use medico_server::db::moderators::NewModerator;
use medico_server::db::pharmacies::{NewPharmacist, PharmacyFields};
use medico_server::db::{
    self, CitizenRepository, DoctorRepository, MedicamentRepository, ModeratorRepository,
    PharmacyRepository,
};
use medico_server::services::auth::hash_new_password;

/// Medicaments stocked at the demo branch: name, ingredients, ATC code,
/// prescription only.
const MEDICAMENTS: [(&str, &str, &str, bool); 3] = [
    ("Paracetamol 500mg", "paracetamol", "N02BE01", false),
    ("Amoxicillin 250mg", "amoxicillin", "J01CA04", true),
    ("Ibuprofen 400mg", "ibuprofen", "M01AE01", false),
];

const STOCK_PER_MEDICAMENT: i32 = 100;

/// Insert the demo data set.
///
/// # Errors
///
/// Returns an error if environment variables are missing, the password is
/// too weak, or any insert fails.
pub async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let password =
        std::env::var("MEDICO_SEED_PASSWORD").map_err(|_| "MEDICO_SEED_PASSWORD not set")?;
    let password_hash = hash_new_password(&password)?;

    let database_url = super::database_url().map_err(|var| format!("{var} not set"))?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let doctors = DoctorRepository::new(&pool);
    let hospital = doctors
        .create_hospital("Alexandrovska", "Sofia", "1 Georgi Sofiyski St")
        .await?;

    let doctor_email = Email::parse("doctor@medico.example")?;
    let doctor = doctors
        .create(
            &DoctorFields {
                first_name: "Elena",
                second_name: "Petrova",
                last_name: "Ivanova",
                uin: &Uin::parse("DR00000001")?,
                email: &doctor_email,
                hospital_id: Some(hospital.id),
            },
            &password_hash,
        )
        .await?;
    info!(id = %doctor.id, email = %doctor_email, "Doctor created");

    let citizen_email = Email::parse("citizen@medico.example")?;
    let citizen = CitizenRepository::new(&pool)
        .create(
            &CitizenFields {
                first_name: "Georgi",
                second_name: "Stoyanov",
                last_name: "Dimitrov",
                ucn: &Ucn::parse("8502124455")?,
                birth_date: NaiveDate::from_ymd_opt(1985, 2, 12).ok_or("invalid birth date")?,
                height_cm: Some(178.0),
                weight_kg: Some(74.5),
                address: "12 Vitosha Blvd",
                city: "Sofia",
                email: &citizen_email,
                personal_doctor_id: Some(doctor.id),
            },
            &password_hash,
        )
        .await?;
    info!(id = %citizen.id, email = %citizen_email, "Citizen created");

    let medicament_repo = MedicamentRepository::new(&pool);
    let mut stock = Vec::with_capacity(MEDICAMENTS.len());
    for (name, ingredient, atc, requires_prescription) in MEDICAMENTS {
        let medicament = medicament_repo
            .create(&MedicamentFields {
                official_name: name,
                active_ingredients: &[ingredient.to_owned()],
                atc: &AtcCode::parse(atc)?,
                requires_prescription,
            })
            .await?;
        stock.push((medicament.id, STOCK_PER_MEDICAMENT));
    }
    info!(count = stock.len(), "Medicaments created");

    let pharmacies = PharmacyRepository::new(&pool);
    let owner_email = Email::parse("owner@medico.example")?;
    let brand = pharmacies
        .create_brand(
            &PharmacyFields {
                name: "Green Cross",
                owner_name: "Maria Koleva",
                owner_email: &owner_email,
            },
            &password_hash,
        )
        .await?;
    let branch = pharmacies
        .create_branch(
            brand.owner.id,
            "Green Cross Center",
            Coordinates::new(42.6977, 23.3219)?,
        )
        .await?;
    pharmacies.add_storage(branch.id, &stock).await?;
    info!(brand = %brand.id, branch = %branch.id, email = %owner_email, "Pharmacy created");

    let pharmacist_email = Email::parse("pharmacist@medico.example")?;
    let pharmacist = pharmacies
        .create_pharmacist(
            brand.owner.id,
            NewPharmacist {
                first_name: "Ivan",
                last_name: "Nikolov",
                branch_id: branch.id,
                email: &pharmacist_email,
                password_hash: &password_hash,
            },
        )
        .await?;
    info!(id = %pharmacist.id, email = %pharmacist_email, "Pharmacist created");

    let moderators = ModeratorRepository::new(&pool);
    for kind in ModeratorKind::ALL {
        let email = Email::parse(&format!("{kind}.moderator@medico.example"))?;
        let moderator = moderators
            .create(NewModerator {
                first_name: "Demo",
                last_name: "Moderator",
                kind,
                email: &email,
                password_hash: &password_hash,
            })
            .await?;
        info!(id = %moderator.id, %kind, %email, "Moderator created");
    }

    info!("Demo data seeded");
    Ok(())
}
