//! Pharmacy repository: brands with their owner accounts, branches,
//! pharmacists and branch storage.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use medico_core::{
    Coordinates, Email, MedicamentId, PharmacistId, PharmacyBranchId, PharmacyBrandId,
    PharmacyOwnerId, Role,
};

use super::accounts::{EMAIL_TAKEN, insert_credentials};
use super::{RepositoryError, parse_email};
use crate::models::{
    AvailableBranch, Pharmacist, PharmacyBranch, PharmacyBrand, PharmacyOwner, StorageItem,
};

const BRAND_NAME_TAKEN: &str = "a pharmacy with this name already exists";

const SELECT_BRAND: &str = r"
    SELECT br.id, br.name, br.created_at,
           o.id AS owner_id, o.name AS owner_name, a.email AS owner_email,
           (SELECT count(*) FROM medico.pharmacy_branch b WHERE b.brand_id = br.id) AS branch_count
    FROM medico.pharmacy_brand br
    JOIN medico.pharmacy_owner o ON o.id = br.owner_id
    JOIN medico.pharmacy_owner_auth a ON a.id = o.id
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BrandRow {
    id: PharmacyBrandId,
    name: String,
    created_at: DateTime<Utc>,
    owner_id: PharmacyOwnerId,
    owner_name: String,
    owner_email: String,
    branch_count: i64,
}

impl TryFrom<BrandRow> for PharmacyBrand {
    type Error = RepositoryError;

    fn try_from(row: BrandRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            owner: PharmacyOwner {
                id: row.owner_id,
                name: row.owner_name,
                email: parse_email(&row.owner_email)?,
            },
            branch_count: row.branch_count,
            created_at: row.created_at,
        })
    }
}

fn coordinates(latitude: f64, longitude: f64) -> Result<Coordinates, RepositoryError> {
    Coordinates::new(latitude, longitude).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid branch location in database: {e}"))
    })
}

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: PharmacyBranchId,
    brand_id: PharmacyBrandId,
    name: String,
    latitude: f64,
    longitude: f64,
}

impl TryFrom<BranchRow> for PharmacyBranch {
    type Error = RepositoryError;

    fn try_from(row: BranchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            brand_id: row.brand_id,
            name: row.name,
            location: coordinates(row.latitude, row.longitude)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AvailableBranchRow {
    id: PharmacyBranchId,
    brand: String,
    name: String,
    latitude: f64,
    longitude: f64,
}

impl TryFrom<AvailableBranchRow> for AvailableBranch {
    type Error = RepositoryError;

    fn try_from(row: AvailableBranchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            brand: row.brand,
            name: row.name,
            location: coordinates(row.latitude, row.longitude)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PharmacistRow {
    id: PharmacistId,
    first_name: String,
    last_name: String,
    email: String,
    branch_id: PharmacyBranchId,
}

impl TryFrom<PharmacistRow> for Pharmacist {
    type Error = RepositoryError;

    fn try_from(row: PharmacistRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: parse_email(&row.email)?,
            branch_id: row.branch_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StorageRow {
    medicament_id: MedicamentId,
    official_name: String,
    quantity: i32,
}

impl From<StorageRow> for StorageItem {
    fn from(row: StorageRow) -> Self {
        Self {
            medicament_id: row.medicament_id,
            official_name: row.official_name,
            quantity: row.quantity,
        }
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Fields of a pharmacy brand and its owner account.
#[derive(Debug)]
pub struct PharmacyFields<'a> {
    pub name: &'a str,
    pub owner_name: &'a str,
    pub owner_email: &'a Email,
}

/// Fields of a new pharmacist.
#[derive(Debug)]
pub struct NewPharmacist<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub branch_id: PharmacyBranchId,
    pub email: &'a Email,
    pub password_hash: &'a str,
}

/// Accounts removed together with a pharmacy.
#[derive(Debug, Clone)]
pub struct DeletedPharmacy {
    pub owner_id: PharmacyOwnerId,
    pub pharmacist_ids: Vec<PharmacistId>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for pharmacies.
pub struct PharmacyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PharmacyRepository<'a> {
    /// Create a new pharmacy repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all pharmacy brands ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_brands(&self) -> Result<Vec<PharmacyBrand>, RepositoryError> {
        let sql = format!("{SELECT_BRAND} ORDER BY br.name");
        let rows = sqlx::query_as::<_, BrandRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a pharmacy brand by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_brand(
        &self,
        id: PharmacyBrandId,
    ) -> Result<Option<PharmacyBrand>, RepositoryError> {
        let sql = format!("{SELECT_BRAND} WHERE br.id = $1");
        let row = sqlx::query_as::<_, BrandRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// The brand run by an owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn brand_of_owner(
        &self,
        owner_id: PharmacyOwnerId,
    ) -> Result<Option<PharmacyBrand>, RepositoryError> {
        let sql = format!("{SELECT_BRAND} WHERE br.owner_id = $1");
        let row = sqlx::query_as::<_, BrandRow>(&sql)
            .bind(owner_id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a pharmacy brand together with its owner account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the brand name or owner email
    /// is taken.
    pub async fn create_brand(
        &self,
        fields: &PharmacyFields<'_>,
        owner_password_hash: &str,
    ) -> Result<PharmacyBrand, RepositoryError> {
        let owner_id = PharmacyOwnerId::generate();
        let brand_id = PharmacyBrandId::generate();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO medico.pharmacy_owner (id, name) VALUES ($1, $2)")
            .bind(owner_id)
            .bind(fields.owner_name)
            .execute(&mut *tx)
            .await?;

        insert_credentials(
            &mut *tx,
            Role::PharmacyOwner,
            *owner_id.as_uuid(),
            fields.owner_email,
            owner_password_hash,
        )
        .await?;

        sqlx::query("INSERT INTO medico.pharmacy_brand (id, name, owner_id) VALUES ($1, $2, $3)")
            .bind(brand_id)
            .bind(fields.name)
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(e, BRAND_NAME_TAKEN, "pharmacy owner is missing")
            })?;

        tx.commit().await?;

        self.get_brand(brand_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Rename a brand and update its owner account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no brand has this ID.
    /// Returns `RepositoryError::Conflict` on a taken name or email.
    pub async fn update_brand(
        &self,
        id: PharmacyBrandId,
        fields: &PharmacyFields<'_>,
        owner_password_hash: Option<&str>,
    ) -> Result<PharmacyBrand, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let owner_id: PharmacyOwnerId = sqlx::query_scalar(
            r"
            UPDATE medico.pharmacy_brand
            SET name = $2, updated_at = now()
            WHERE id = $1
            RETURNING owner_id
            ",
        )
        .bind(id)
        .bind(fields.name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, BRAND_NAME_TAKEN, BRAND_NAME_TAKEN))?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query("UPDATE medico.pharmacy_owner SET name = $2 WHERE id = $1")
            .bind(owner_id)
            .bind(fields.owner_name)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            UPDATE medico.pharmacy_owner_auth
            SET email = $2, password_hash = COALESCE($3, password_hash)
            WHERE id = $1
            ",
        )
        .bind(owner_id)
        .bind(fields.owner_email)
        .bind(owner_password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, EMAIL_TAKEN, EMAIL_TAKEN))?;

        tx.commit().await?;

        self.get_brand(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a brand, its owner account, branches, storage and pharmacists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no brand has this ID.
    pub async fn delete_brand(
        &self,
        id: PharmacyBrandId,
    ) -> Result<DeletedPharmacy, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let owner_id: PharmacyOwnerId = sqlx::query_scalar(
            "SELECT owner_id FROM medico.pharmacy_brand WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let pharmacist_ids: Vec<PharmacistId> = sqlx::query_scalar(
            r"
            SELECT p.id
            FROM medico.pharmacist p
            JOIN medico.pharmacy_branch b ON b.id = p.branch_id
            WHERE b.brand_id = $1
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        // Brand, branches, storage and pharmacists cascade from the owner.
        sqlx::query("DELETE FROM medico.pharmacy_owner WHERE id = $1")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(DeletedPharmacy {
            owner_id,
            pharmacist_ids,
        })
    }

    /// Branches of the brand run by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn branches_of_owner(
        &self,
        owner_id: PharmacyOwnerId,
    ) -> Result<Vec<PharmacyBranch>, RepositoryError> {
        let rows = sqlx::query_as::<_, BranchRow>(
            r"
            SELECT b.id, b.brand_id, b.name, b.latitude, b.longitude
            FROM medico.pharmacy_branch b
            JOIN medico.pharmacy_brand br ON br.id = b.brand_id
            WHERE br.owner_id = $1
            ORDER BY b.name
            ",
        )
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Open a new branch of the brand run by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner has no brand.
    pub async fn create_branch(
        &self,
        owner_id: PharmacyOwnerId,
        name: &str,
        location: Coordinates,
    ) -> Result<PharmacyBranch, RepositoryError> {
        let row = sqlx::query_as::<_, BranchRow>(
            r"
            INSERT INTO medico.pharmacy_branch (id, brand_id, name, latitude, longitude)
            SELECT $1, br.id, $3, $4, $5
            FROM medico.pharmacy_brand br
            WHERE br.owner_id = $2
            RETURNING id, brand_id, name, latitude, longitude
            ",
        )
        .bind(PharmacyBranchId::generate())
        .bind(owner_id)
        .bind(name)
        .bind(location.latitude)
        .bind(location.longitude)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Pharmacists working at any branch of the brand run by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pharmacists_of_owner(
        &self,
        owner_id: PharmacyOwnerId,
    ) -> Result<Vec<Pharmacist>, RepositoryError> {
        let rows = sqlx::query_as::<_, PharmacistRow>(
            r"
            SELECT p.id, p.first_name, p.last_name, a.email, p.branch_id
            FROM medico.pharmacist p
            JOIN medico.pharmacist_auth a ON a.id = p.id
            JOIN medico.pharmacy_branch b ON b.id = p.branch_id
            JOIN medico.pharmacy_brand br ON br.id = b.brand_id
            WHERE br.owner_id = $1
            ORDER BY p.last_name, p.first_name
            ",
        )
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Hire a pharmacist at one of the owner's branches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the branch does not belong to
    /// the owner.
    /// Returns `RepositoryError::Conflict` if the email is taken.
    pub async fn create_pharmacist(
        &self,
        owner_id: PharmacyOwnerId,
        new: NewPharmacist<'_>,
    ) -> Result<Pharmacist, RepositoryError> {
        let id = PharmacistId::generate();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r"
            INSERT INTO medico.pharmacist (id, first_name, last_name, branch_id)
            SELECT $1, $2, $3, b.id
            FROM medico.pharmacy_branch b
            JOIN medico.pharmacy_brand br ON br.id = b.brand_id
            WHERE b.id = $4 AND br.owner_id = $5
            ",
        )
        .bind(id)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.branch_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        insert_credentials(
            &mut *tx,
            Role::Pharmacist,
            *id.as_uuid(),
            new.email,
            new.password_hash,
        )
        .await?;
        tx.commit().await?;

        Ok(Pharmacist {
            id,
            first_name: new.first_name.to_owned(),
            last_name: new.last_name.to_owned(),
            email: new.email.clone(),
            branch_id: new.branch_id,
        })
    }

    /// Get a pharmacist by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_pharmacist(
        &self,
        id: PharmacistId,
    ) -> Result<Option<Pharmacist>, RepositoryError> {
        let row = sqlx::query_as::<_, PharmacistRow>(
            r"
            SELECT p.id, p.first_name, p.last_name, a.email, p.branch_id
            FROM medico.pharmacist p
            JOIN medico.pharmacist_auth a ON a.id = p.id
            WHERE p.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// The branch a pharmacist works at.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the pharmacist no longer exists.
    pub async fn branch_of_pharmacist(
        &self,
        pharmacist_id: PharmacistId,
    ) -> Result<PharmacyBranchId, RepositoryError> {
        sqlx::query_scalar::<_, PharmacyBranchId>(
            "SELECT branch_id FROM medico.pharmacist WHERE id = $1",
        )
        .bind(pharmacist_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Stock held by a branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn storage(
        &self,
        branch_id: PharmacyBranchId,
    ) -> Result<Vec<StorageItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, StorageRow>(
            r"
            SELECT s.medicament_id, m.official_name, s.quantity
            FROM medico.pharmacy_branch_storage s
            JOIN medico.medicament m ON m.id = s.medicament_id
            WHERE s.branch_id = $1
            ORDER BY m.official_name
            ",
        )
        .bind(branch_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add stock to a branch, creating storage rows as needed.
    ///
    /// All items are added in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a medicament does not exist or a
    /// quantity would overflow.
    pub async fn add_storage(
        &self,
        branch_id: PharmacyBranchId,
        items: &[(MedicamentId, i32)],
    ) -> Result<Vec<StorageItem>, RepositoryError> {
        // Same lock order as dispensing
        let mut ordered: Vec<&(MedicamentId, i32)> = items.iter().collect();
        ordered.sort_by_key(|(id, _)| *id.as_uuid());

        let mut tx = self.pool.begin().await?;

        for (medicament_id, quantity) in ordered {
            sqlx::query(
                r"
                INSERT INTO medico.pharmacy_branch_storage (branch_id, medicament_id, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (branch_id, medicament_id)
                DO UPDATE SET quantity = pharmacy_branch_storage.quantity + EXCLUDED.quantity
                ",
            )
            .bind(branch_id)
            .bind(medicament_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.code().as_deref() == Some("22003")
                {
                    return RepositoryError::Conflict("storage quantity is too large".to_owned());
                }
                RepositoryError::from_constraint(
                    e,
                    "storage already exists",
                    "medicament does not exist",
                )
            })?;
        }

        tx.commit().await?;

        self.storage(branch_id).await
    }

    /// Branches holding at least `quantity` of every listed medicament.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn branches_covering(
        &self,
        items: &[(MedicamentId, i32)],
    ) -> Result<Vec<AvailableBranch>, RepositoryError> {
        let (medicament_ids, quantities): (Vec<MedicamentId>, Vec<i32>) =
            items.iter().copied().unzip();

        let rows = sqlx::query_as::<_, AvailableBranchRow>(
            r"
            SELECT b.id, br.name AS brand, b.name, b.latitude, b.longitude
            FROM medico.pharmacy_branch b
            JOIN medico.pharmacy_brand br ON br.id = b.brand_id
            WHERE NOT EXISTS (
                SELECT 1
                FROM unnest($1::uuid[], $2::int4[]) AS wanted(medicament_id, quantity)
                WHERE NOT EXISTS (
                    SELECT 1
                    FROM medico.pharmacy_branch_storage s
                    WHERE s.branch_id = b.id
                      AND s.medicament_id = wanted.medicament_id
                      AND s.quantity >= wanted.quantity
                )
            )
            ORDER BY br.name, b.name
            ",
        )
        .bind(&medicament_ids)
        .bind(&quantities)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
