//! Prescription repository, including the dispensing transaction.
//!
//! Dispensing touches three tables: the prescription state, the line item
//! `fulfilled` flags and the branch storage quantities. All three change in
//! one transaction. Locks are always taken in the same order: prescription
//! rows by id first, then storage rows by medicament id, with the demand for
//! each medicament summed over the whole request. Two pharmacists dispensing
//! overlapping prescriptions therefore serialize instead of double-dispensing
//! or deadlocking.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use medico_core::{
    CitizenId, DoctorId, MedicamentId, PharmacyBranchId, PrescriptionId, PrescriptionState,
};

use super::RepositoryError;
use crate::models::{Prescription, PrescriptionItem};

const SELECT_PRESCRIPTION: &str = r"
    SELECT p.id, p.name, p.doctor_id, d.first_name || ' ' || d.last_name AS doctor_name,
           p.citizen_id, p.state, p.created_at, p.start_date, p.end_date
    FROM medico.prescription p
    JOIN medico.doctor d ON d.id = p.doctor_id
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PrescriptionRow {
    id: PrescriptionId,
    name: String,
    doctor_id: DoctorId,
    doctor_name: String,
    citizen_id: CitizenId,
    state: PrescriptionState,
    created_at: DateTime<Utc>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    prescription_id: PrescriptionId,
    medicament_id: MedicamentId,
    official_name: String,
    quantity: i32,
    fulfilled: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct LockedPrescription {
    state: PrescriptionState,
    end_date: DateTime<Utc>,
    doctor_id: DoctorId,
}

#[derive(Debug, sqlx::FromRow)]
struct PendingItem {
    medicament_id: MedicamentId,
    quantity: i32,
}

/// Fields of a new prescription.
#[derive(Debug)]
pub struct NewPrescription<'a> {
    pub name: &'a str,
    pub doctor_id: DoctorId,
    pub citizen_id: CitizenId,
    pub end_date: DateTime<Utc>,
    pub items: &'a [(MedicamentId, i32)],
}

/// Which line items of a prescription to dispense.
#[derive(Debug, Clone)]
pub enum Dispense {
    /// Every item not dispensed yet.
    All,
    /// Only these medicaments.
    Items(Vec<MedicamentId>),
}

/// Repository for prescriptions.
pub struct PrescriptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PrescriptionRepository<'a> {
    /// Create a new prescription repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Attach line items to prescription header rows.
    async fn with_items(
        &self,
        rows: Vec<PrescriptionRow>,
    ) -> Result<Vec<Prescription>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<PrescriptionId> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT pm.prescription_id, pm.medicament_id, m.official_name, pm.quantity, pm.fulfilled
            FROM medico.prescription_medicament pm
            JOIN medico.medicament m ON m.id = pm.medicament_id
            WHERE pm.prescription_id = ANY($1)
            ORDER BY m.official_name
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_prescription: HashMap<PrescriptionId, Vec<PrescriptionItem>> = HashMap::new();
        for item in items {
            by_prescription
                .entry(item.prescription_id)
                .or_default()
                .push(PrescriptionItem {
                    medicament_id: item.medicament_id,
                    official_name: item.official_name,
                    quantity: item.quantity,
                    fulfilled: item.fulfilled,
                });
        }

        Ok(rows
            .into_iter()
            .map(|row| Prescription {
                medicaments: by_prescription.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                doctor_id: row.doctor_id,
                doctor_name: row.doctor_name,
                citizen_id: row.citizen_id,
                state: row.state,
                created_at: row.created_at,
                start_date: row.start_date,
                end_date: row.end_date,
            })
            .collect())
    }

    /// Get a prescription by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PrescriptionId) -> Result<Option<Prescription>, RepositoryError> {
        let sql = format!("{SELECT_PRESCRIPTION} WHERE p.id = $1");
        let row = sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.with_items(vec![row]).await?.into_iter().next())
    }

    /// Prescriptions of a citizen, newest first, optionally only one state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_citizen(
        &self,
        citizen_id: CitizenId,
        state: Option<PrescriptionState>,
    ) -> Result<Vec<Prescription>, RepositoryError> {
        let sql = format!(
            "{SELECT_PRESCRIPTION}
             WHERE p.citizen_id = $1 AND ($2::medico.prescription_state IS NULL OR p.state = $2)
             ORDER BY p.created_at DESC"
        );
        let rows = sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(citizen_id)
            .bind(state)
            .fetch_all(self.pool)
            .await?;

        self.with_items(rows).await
    }

    /// Store a new active prescription starting now.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the citizen or a medicament
    /// does not exist, or a medicament is listed twice.
    pub async fn create(&self, new: &NewPrescription<'_>) -> Result<Prescription, RepositoryError> {
        let id = PrescriptionId::generate();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO medico.prescription (id, name, doctor_id, citizen_id, state, created_at, start_date, end_date)
            VALUES ($1, $2, $3, $4, 'active', now(), now(), $5)
            ",
        )
        .bind(id)
        .bind(new.name)
        .bind(new.doctor_id)
        .bind(new.citizen_id)
        .bind(new.end_date)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(e, "prescription already exists", "citizen does not exist")
        })?;

        for (medicament_id, quantity) in new.items {
            sqlx::query(
                r"
                INSERT INTO medico.prescription_medicament (prescription_id, medicament_id, quantity)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(id)
            .bind(medicament_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(
                    e,
                    "medicament is listed twice",
                    "medicament does not exist",
                )
            })?;
        }

        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Withdraw an active prescription issued by `doctor_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the doctor issued no such
    /// prescription.
    /// Returns `RepositoryError::Conflict` if it is no longer active.
    pub async fn invalidate(
        &self,
        id: PrescriptionId,
        doctor_id: DoctorId,
    ) -> Result<Prescription, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked = lock(&mut tx, id).await?;
        if locked.doctor_id != doctor_id {
            return Err(RepositoryError::NotFound);
        }
        if locked.state.is_terminal() {
            return Err(RepositoryError::Conflict(format!(
                "prescription is already {}",
                locked.state
            )));
        }

        sqlx::query("UPDATE medico.prescription SET state = 'invalid' WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Dispense prescriptions from a branch's storage in one transaction.
    ///
    /// Each prescription must be active and not past its end date. Every
    /// selected item must still be pending and the branch must hold enough
    /// of it. A prescription becomes `fulfilled` once no pending items remain.
    /// On any failure nothing is changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown prescription.
    /// Returns `RepositoryError::Conflict` for an inactive or expired
    /// prescription or an item that is not pending.
    /// Returns `RepositoryError::InsufficientStock` when the branch runs short.
    pub async fn dispense(
        &self,
        branch_id: PharmacyBranchId,
        requests: &[(PrescriptionId, Dispense)],
        now: DateTime<Utc>,
    ) -> Result<Vec<Prescription>, RepositoryError> {
        let mut ordered: Vec<&(PrescriptionId, Dispense)> = requests.iter().collect();
        ordered.sort_by_key(|(id, _)| *id.as_uuid());

        let mut tx = self.pool.begin().await?;

        let mut selected = Vec::with_capacity(ordered.len());
        for (prescription_id, which) in ordered {
            let items = select_pending(&mut tx, *prescription_id, which, now).await?;
            selected.push((*prescription_id, items));
        }

        for (medicament_id, quantity) in stock_demand(&selected) {
            take_stock(&mut tx, branch_id, medicament_id, quantity).await?;
        }

        for (prescription_id, items) in &selected {
            mark_fulfilled(&mut tx, *prescription_id, items).await?;
        }

        tx.commit().await?;

        let mut dispensed = Vec::with_capacity(requests.len());
        for (prescription_id, _) in requests {
            if let Some(p) = self.get(*prescription_id).await? {
                dispensed.push(p);
            }
        }
        Ok(dispensed)
    }
}

/// Lock a prescription row for the rest of the transaction.
async fn lock(
    conn: &mut PgConnection,
    id: PrescriptionId,
) -> Result<LockedPrescription, RepositoryError> {
    sqlx::query_as::<_, LockedPrescription>(
        "SELECT state, end_date, doctor_id FROM medico.prescription WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Lock a prescription, check it can be dispensed and pick the requested
/// pending items.
async fn select_pending(
    conn: &mut PgConnection,
    prescription_id: PrescriptionId,
    which: &Dispense,
    now: DateTime<Utc>,
) -> Result<Vec<PendingItem>, RepositoryError> {
    let locked = lock(conn, prescription_id).await?;
    check_dispensable(&locked, now)?;

    let pending = sqlx::query_as::<_, PendingItem>(
        r"
        SELECT medicament_id, quantity
        FROM medico.prescription_medicament
        WHERE prescription_id = $1 AND NOT fulfilled
        ORDER BY medicament_id
        FOR UPDATE
        ",
    )
    .bind(prescription_id)
    .fetch_all(&mut *conn)
    .await?;

    select_items(pending, which, prescription_id)
}

/// Total quantity per medicament across a whole request, sorted by
/// medicament so storage rows are always locked in the same order.
fn stock_demand(selected: &[(PrescriptionId, Vec<PendingItem>)]) -> Vec<(MedicamentId, i32)> {
    let mut demand: HashMap<MedicamentId, i32> = HashMap::new();
    for item in selected.iter().flat_map(|(_, items)| items) {
        let total = demand.entry(item.medicament_id).or_default();
        *total = total.saturating_add(item.quantity);
    }

    let mut demand: Vec<(MedicamentId, i32)> = demand.into_iter().collect();
    demand.sort_by_key(|(id, _)| *id.as_uuid());
    demand
}

async fn take_stock(
    conn: &mut PgConnection,
    branch_id: PharmacyBranchId,
    medicament_id: MedicamentId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let taken = sqlx::query(
        r"
        UPDATE medico.pharmacy_branch_storage
        SET quantity = quantity - $3
        WHERE branch_id = $1 AND medicament_id = $2 AND quantity >= $3
        ",
    )
    .bind(branch_id)
    .bind(medicament_id)
    .bind(quantity)
    .execute(conn)
    .await?;

    if taken.rows_affected() == 0 {
        return Err(RepositoryError::InsufficientStock { medicament_id });
    }
    Ok(())
}

/// Flag dispensed items and close the prescription once nothing is pending.
async fn mark_fulfilled(
    conn: &mut PgConnection,
    prescription_id: PrescriptionId,
    items: &[PendingItem],
) -> Result<(), RepositoryError> {
    let medicament_ids: Vec<MedicamentId> = items.iter().map(|i| i.medicament_id).collect();
    sqlx::query(
        r"
        UPDATE medico.prescription_medicament
        SET fulfilled = TRUE
        WHERE prescription_id = $1 AND medicament_id = ANY($2)
        ",
    )
    .bind(prescription_id)
    .bind(&medicament_ids)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        UPDATE medico.prescription
        SET state = 'fulfilled'
        WHERE id = $1
          AND NOT EXISTS (
              SELECT 1 FROM medico.prescription_medicament
              WHERE prescription_id = $1 AND NOT fulfilled
          )
        ",
    )
    .bind(prescription_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn check_dispensable(locked: &LockedPrescription, now: DateTime<Utc>) -> Result<(), RepositoryError> {
    match locked.state {
        PrescriptionState::Active if locked.end_date < now => Err(RepositoryError::Conflict(
            "prescription has expired".to_owned(),
        )),
        PrescriptionState::Active => Ok(()),
        PrescriptionState::Fulfilled => Err(RepositoryError::Conflict(
            "prescription has already been fulfilled".to_owned(),
        )),
        PrescriptionState::Invalid => Err(RepositoryError::Conflict(
            "prescription is no longer valid".to_owned(),
        )),
    }
}

/// Pick the pending items a request asks for.
fn select_items(
    pending: Vec<PendingItem>,
    which: &Dispense,
    prescription_id: PrescriptionId,
) -> Result<Vec<PendingItem>, RepositoryError> {
    let Dispense::Items(wanted) = which else {
        return Ok(pending);
    };

    if let Some(missing) = wanted
        .iter()
        .find(|id| !pending.iter().any(|item| item.medicament_id == **id))
    {
        return Err(RepositoryError::Conflict(format!(
            "medicament {missing} is not pending on prescription {prescription_id}"
        )));
    }

    Ok(pending
        .into_iter()
        .filter(|item| wanted.contains(&item.medicament_id))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn locked(state: PrescriptionState, end_in: Duration) -> LockedPrescription {
        LockedPrescription {
            state,
            end_date: Utc::now() + end_in,
            doctor_id: DoctorId::generate(),
        }
    }

    #[test]
    fn test_check_dispensable() {
        let now = Utc::now();
        assert!(check_dispensable(&locked(PrescriptionState::Active, Duration::days(1)), now).is_ok());

        let err = check_dispensable(&locked(PrescriptionState::Fulfilled, Duration::days(1)), now)
            .unwrap_err();
        assert_eq!(err.to_string(), "prescription has already been fulfilled");

        let err = check_dispensable(&locked(PrescriptionState::Active, Duration::days(-1)), now)
            .unwrap_err();
        assert_eq!(err.to_string(), "prescription has expired");

        assert!(
            check_dispensable(&locked(PrescriptionState::Invalid, Duration::days(1)), now).is_err()
        );
    }

    #[test]
    fn test_select_items() {
        let a = MedicamentId::generate();
        let b = MedicamentId::generate();
        let pending = || {
            vec![
                PendingItem {
                    medicament_id: a,
                    quantity: 1,
                },
                PendingItem {
                    medicament_id: b,
                    quantity: 3,
                },
            ]
        };
        let pid = PrescriptionId::generate();

        assert_eq!(select_items(pending(), &Dispense::All, pid).unwrap().len(), 2);

        let only_b = select_items(pending(), &Dispense::Items(vec![b]), pid).unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].medicament_id, b);
        assert_eq!(only_b[0].quantity, 3);

        let other = MedicamentId::generate();
        assert!(matches!(
            select_items(pending(), &Dispense::Items(vec![other]), pid),
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[test]
    fn test_stock_demand_is_summed_and_sorted() {
        let mut ids = [
            MedicamentId::generate(),
            MedicamentId::generate(),
            MedicamentId::generate(),
        ];
        ids.sort_by_key(|id| *id.as_uuid());
        let [low, mid, high] = ids;
        let item = |medicament_id, quantity| PendingItem {
            medicament_id,
            quantity,
        };

        // Two prescriptions listing shared medicaments in opposite orders
        let first = vec![item(high, 1), item(low, 2)];
        let second = vec![item(low, 3), item(mid, 1), item(high, 4)];
        let forward = [
            (PrescriptionId::generate(), first),
            (PrescriptionId::generate(), second),
        ];
        let demand = stock_demand(&forward);
        assert_eq!(demand, vec![(low, 5), (mid, 1), (high, 5)]);

        let [(a, first), (b, second)] = forward;
        assert_eq!(stock_demand(&[(b, second), (a, first)]), demand);
    }

    #[test]
    fn test_stock_demand_saturates() {
        let m = MedicamentId::generate();
        let selected = [
            (
                PrescriptionId::generate(),
                vec![PendingItem {
                    medicament_id: m,
                    quantity: i32::MAX,
                }],
            ),
            (
                PrescriptionId::generate(),
                vec![PendingItem {
                    medicament_id: m,
                    quantity: 1,
                }],
            ),
        ];
        assert_eq!(stock_demand(&selected), vec![(m, i32::MAX)]);
    }
}
