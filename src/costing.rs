//! Procedure profit ("utility"): computed on every write and backfilled
//! lazily on read for historical rows that never got one.
//!
//! `utility = income - catalog total cost - material - fuel - extra service`
//! where income is the sum of the five payment-method amounts.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::repository::{
    delete_procedure_record, get_catalog_total_cost, get_procedure_record,
    insert_procedure_record, list_procedure_records, now_timestamp, set_procedure_utility,
    update_procedure_record,
};
use crate::db::DatabaseError;
use crate::models::enums::PaymentMethod;
use crate::models::*;

#[derive(Debug, thiserror::Error)]
pub enum ProcedureError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Invalid procedure record: {0}")]
    Invalid(String),
}

impl PaymentAmounts {
    fn amounts(&self) -> impl Iterator<Item = Decimal> + '_ {
        PaymentMethod::ALL.into_iter().filter_map(move |m| self.get(m))
    }

    /// Sum of all payment methods, missing amounts counted as zero.
    /// `None` when the sum overflows.
    pub fn checked_income(&self) -> Option<Decimal> {
        self.amounts().try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
    }

    /// Same as `checked_income`, clamped to the decimal range.
    pub fn income(&self) -> Decimal {
        self.amounts().fold(Decimal::ZERO, |acc, v| acc.saturating_add(v))
    }

    /// Methods carrying a non-zero amount.
    pub fn used_methods(&self) -> Vec<PaymentMethod> {
        PaymentMethod::ALL
            .into_iter()
            .filter(|m| self.get(*m).is_some_and(|v| !v.is_zero()))
            .collect()
    }

    /// The method carrying the payment under the single-payment
    /// convention; the first non-zero one if several are set.
    pub fn primary_method(&self) -> Option<PaymentMethod> {
        self.used_methods().into_iter().next()
    }
}

impl ProcedureExpenses {
    /// `None` when the sum overflows.
    pub fn total(&self) -> Option<Decimal> {
        [self.material_expense, self.fuel_expense, self.extra_service_cost]
            .into_iter()
            .flatten()
            .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
    }

    fn any_nonzero(&self) -> bool {
        [self.material_expense, self.fuel_expense, self.extra_service_cost]
            .into_iter()
            .flatten()
            .any(|v| !v.is_zero())
    }
}

impl ProcedureRecord {
    /// Whether any income or expense field is non-zero. A record with no
    /// activity and no stored utility stays "unset".
    pub fn has_activity(&self) -> bool {
        !self.payments.used_methods().is_empty() || self.expenses.any_nonzero()
    }
}

/// The profit formula. `None` when an intermediate value overflows.
pub fn compute_utility(
    payments: &PaymentAmounts,
    catalog_total_cost: Decimal,
    expenses: &ProcedureExpenses,
) -> Option<Decimal> {
    payments
        .checked_income()?
        .checked_sub(catalog_total_cost)?
        .checked_sub(expenses.total()?)
}

/// Total cost of the referenced catalog item, inactive items included.
///
/// A missing item or failed lookup reads as zero. With a stale id this
/// overstates the utility; the lookup is logged so it can be traced.
pub fn catalog_cost_for(conn: &Connection, catalog_item_id: Option<&Uuid>) -> Decimal {
    let Some(id) = catalog_item_id else {
        return Decimal::ZERO;
    };
    match get_catalog_total_cost(conn, id) {
        Ok(Some(cost)) => cost,
        Ok(None) => {
            tracing::warn!(catalog_item_id = %id, "Catalog item not found, costing as zero");
            Decimal::ZERO
        }
        Err(e) => {
            tracing::warn!(catalog_item_id = %id, error = %e, "Catalog cost lookup failed, costing as zero");
            Decimal::ZERO
        }
    }
}

/// Recompute the utility of a record from its inputs.
pub fn recompute_utility(conn: &Connection, record: &ProcedureRecord) -> Option<Decimal> {
    let cost = catalog_cost_for(conn, record.catalog_item_id.as_ref());
    compute_utility(&record.payments, cost, &record.expenses)
}

fn utility_for(conn: &Connection, record: &ProcedureRecord) -> Result<Decimal, ProcedureError> {
    recompute_utility(conn, record).ok_or_else(|| ProcedureError::Invalid("amount too large".into()))
}

fn validate(input: &ProcedureInput) -> Result<(), ProcedureError> {
    let day = input.date.trim().get(..10).unwrap_or("");
    if NaiveDate::parse_from_str(day, "%Y-%m-%d").is_err() {
        return Err(ProcedureError::Invalid(format!(
            "date must start with YYYY-MM-DD, got {:?}",
            input.date
        )));
    }
    if input.quantity < 1 {
        return Err(ProcedureError::Invalid("quantity must be at least 1".into()));
    }
    let amounts = PaymentMethod::ALL
        .iter()
        .filter_map(|m| input.payments.get(*m))
        .chain(
            [
                input.expenses.material_expense,
                input.expenses.fuel_expense,
                input.expenses.extra_service_cost,
            ]
            .into_iter()
            .flatten(),
        );
    for amount in amounts {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ProcedureError::Invalid("amounts cannot be negative".into()));
        }
    }
    let used = input.payments.used_methods();
    if used.len() > 1 {
        tracing::debug!(methods = ?used, "Procedure paid with several methods");
    }
    Ok(())
}

/// Create a record. The stored utility is always computed here.
pub fn create_procedure(conn: &Connection, input: ProcedureInput) -> Result<ProcedureRecord, ProcedureError> {
    validate(&input)?;
    let now = now_timestamp();
    let mut record = ProcedureRecord {
        id: Uuid::new_v4(),
        date: input.date.trim().to_string(),
        patient_id: input.patient_id,
        catalog_item_id: input.catalog_item_id,
        quantity: input.quantity,
        payments: input.payments,
        expenses: input.expenses,
        utility: None,
        note: input.note.filter(|n| !n.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };
    record.utility = Some(utility_for(conn, &record)?);
    insert_procedure_record(conn, &record)?;

    tracing::info!(id = %record.id, utility = ?record.utility, "Procedure recorded");
    Ok(record)
}

/// Replace a record's fields and recompute its utility.
pub fn update_procedure(
    conn: &Connection,
    id: &Uuid,
    input: ProcedureInput,
) -> Result<ProcedureRecord, ProcedureError> {
    validate(&input)?;
    let existing = get_procedure_record(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "procedure_record".into(),
        id: id.to_string(),
    })?;

    let mut record = ProcedureRecord {
        id: existing.id,
        date: input.date.trim().to_string(),
        patient_id: input.patient_id,
        catalog_item_id: input.catalog_item_id,
        quantity: input.quantity,
        payments: input.payments,
        expenses: input.expenses,
        utility: None,
        note: input.note.filter(|n| !n.trim().is_empty()),
        created_at: existing.created_at,
        updated_at: now_timestamp(),
    };
    record.utility = Some(utility_for(conn, &record)?);
    update_procedure_record(conn, &record)?;

    tracing::info!(id = %record.id, utility = ?record.utility, "Procedure updated");
    Ok(record)
}

/// Fill a missing utility when the record has activity, persisting it.
/// A failed write is logged; the computed value is still returned.
fn backfill(conn: &Connection, record: &mut ProcedureRecord) {
    if record.utility.is_some() || !record.has_activity() {
        return;
    }
    let Some(utility) = recompute_utility(conn, record) else {
        tracing::warn!(id = %record.id, "Utility overflows, leaving it unset");
        return;
    };
    if let Err(e) = set_procedure_utility(conn, &record.id, &utility) {
        tracing::warn!(id = %record.id, error = %e, "Failed to persist backfilled utility");
    }
    tracing::debug!(id = %record.id, %utility, "Backfilled procedure utility");
    record.utility = Some(utility);
}

pub fn get_procedure(conn: &Connection, id: &Uuid) -> Result<Option<ProcedureRecord>, ProcedureError> {
    let mut record = get_procedure_record(conn, id)?;
    if let Some(ref mut record) = record {
        backfill(conn, record);
    }
    Ok(record)
}

pub fn list_procedures(
    conn: &Connection,
    filter: &ProcedureFilter,
) -> Result<Vec<ProcedureRecord>, ProcedureError> {
    let mut records = list_procedure_records(conn, filter)?;
    for record in records.iter_mut() {
        backfill(conn, record);
    }
    Ok(records)
}

pub fn delete_procedure(conn: &Connection, id: &Uuid) -> Result<(), ProcedureError> {
    delete_procedure_record(conn, id)?;
    tracing::info!(id = %id, "Procedure deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::db::repository::insert_catalog_item;
    use crate::db::sqlite::open_memory_database;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn seed_catalog(conn: &Connection, total_cost: &str) -> Uuid {
        let now = now_timestamp();
        let item = CatalogItem {
            id: Uuid::new_v4(),
            name: "Curación".into(),
            base_price: d("100"),
            labor_cost: d(total_cost),
            mobility_cost: Decimal::ZERO,
            total_cost: d(total_cost),
            utility: d("100") - d(total_cost),
            is_active: true,
            created_at: now,
            updated_at: now,
            materials: Vec::new(),
        };
        insert_catalog_item(conn, &item).unwrap();
        item.id
    }

    fn input(catalog_item_id: Option<Uuid>) -> ProcedureInput {
        ProcedureInput {
            date: "2025-01-05".into(),
            patient_id: None,
            catalog_item_id,
            quantity: 1,
            payments: PaymentAmounts::single(PaymentMethod::Yape, d("100")),
            expenses: ProcedureExpenses {
                material_expense: Some(d("5")),
                fuel_expense: Some(Decimal::ZERO),
                extra_service_cost: None,
            },
            note: None,
        }
    }

    fn insert_raw(conn: &Connection, catalog_item_id: Option<Uuid>, payments: PaymentAmounts) -> ProcedureRecord {
        let now = now_timestamp();
        let record = ProcedureRecord {
            id: Uuid::new_v4(),
            date: "2024-12-01".into(),
            patient_id: None,
            catalog_item_id,
            quantity: 1,
            payments,
            expenses: ProcedureExpenses::default(),
            utility: None,
            note: None,
            created_at: now,
            updated_at: now,
        };
        insert_procedure_record(conn, &record).unwrap();
        record
    }

    #[test]
    fn income_sums_all_methods() {
        let payments = PaymentAmounts {
            yape: Some(d("10")),
            plin: None,
            transfer: Some(d("2.5")),
            card: Some(Decimal::ZERO),
            cash: Some(d("7")),
        };
        assert_eq!(payments.income(), d("19.5"));
        assert_eq!(PaymentAmounts::default().income(), Decimal::ZERO);
    }

    #[test]
    fn primary_method_follows_single_payment_convention() {
        let payments = PaymentAmounts::single(PaymentMethod::Cash, d("60"));
        assert_eq!(payments.primary_method(), Some(PaymentMethod::Cash));
        assert_eq!(PaymentAmounts::default().primary_method(), None);
    }

    #[test]
    fn utility_formula() {
        let payments = PaymentAmounts::single(PaymentMethod::Yape, d("100"));
        let expenses = ProcedureExpenses {
            material_expense: Some(d("5")),
            fuel_expense: Some(d("3")),
            extra_service_cost: Some(d("2")),
        };
        assert_eq!(compute_utility(&payments, d("40"), &expenses), Some(d("50")));
    }

    #[test]
    fn create_computes_utility_from_catalog_cost() {
        let conn = open_memory_database().unwrap();
        let item_id = seed_catalog(&conn, "40");
        let record = create_procedure(&conn, input(Some(item_id))).unwrap();
        assert_eq!(record.utility, Some(d("55")));

        let stored = get_procedure_record(&conn, &record.id).unwrap().unwrap();
        assert_eq!(stored.utility, Some(d("55")));
    }

    #[test]
    fn missing_catalog_item_costs_zero() {
        let conn = open_memory_database().unwrap();
        let record = create_procedure(&conn, input(Some(Uuid::new_v4()))).unwrap();
        assert_eq!(record.utility, Some(d("95")));
    }

    #[test]
    fn inactive_catalog_item_still_costs() {
        let conn = open_memory_database().unwrap();
        let item_id = seed_catalog(&conn, "40");
        crate::db::repository::set_catalog_item_active(&conn, &item_id, false, &now_timestamp()).unwrap();
        let record = create_procedure(&conn, input(Some(item_id))).unwrap();
        assert_eq!(record.utility, Some(d("55")));
    }

    #[test]
    fn update_recomputes_utility() {
        let conn = open_memory_database().unwrap();
        let item_id = seed_catalog(&conn, "40");
        let record = create_procedure(&conn, input(Some(item_id))).unwrap();

        let mut changed = input(Some(item_id));
        changed.payments = PaymentAmounts::single(PaymentMethod::Card, d("150"));
        let updated = update_procedure(&conn, &record.id, changed).unwrap();
        assert_eq!(updated.utility, Some(d("105")));
        assert_eq!(updated.created_at, record.created_at);
    }

    #[test]
    fn update_missing_record_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_procedure(&conn, &Uuid::new_v4(), input(None)).unwrap_err();
        assert!(matches!(err, ProcedureError::Database(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn backfill_fills_null_utility_on_read() {
        let conn = open_memory_database().unwrap();
        let item_id = seed_catalog(&conn, "40");
        let raw = insert_raw(&conn, Some(item_id), PaymentAmounts::single(PaymentMethod::Plin, d("70")));

        let fetched = get_procedure(&conn, &raw.id).unwrap().unwrap();
        assert_eq!(fetched.utility, Some(d("30")));

        // Persisted, and stable on a second read.
        let stored = get_procedure_record(&conn, &raw.id).unwrap().unwrap();
        assert_eq!(stored.utility, Some(d("30")));
        let again = get_procedure(&conn, &raw.id).unwrap().unwrap();
        assert_eq!(again.utility, fetched.utility);
    }

    #[test]
    fn all_zero_record_keeps_unset_utility() {
        let conn = open_memory_database().unwrap();
        let raw = insert_raw(&conn, None, PaymentAmounts::single(PaymentMethod::Cash, Decimal::ZERO));

        let fetched = get_procedure(&conn, &raw.id).unwrap().unwrap();
        assert_eq!(fetched.utility, None);
        let listed = list_procedures(&conn, &ProcedureFilter::default()).unwrap();
        assert_eq!(listed[0].utility, None);
    }

    #[test]
    fn list_backfills_every_row() {
        let conn = open_memory_database().unwrap();
        insert_raw(&conn, None, PaymentAmounts::single(PaymentMethod::Yape, d("10")));
        insert_raw(&conn, None, PaymentAmounts::single(PaymentMethod::Cash, d("20")));

        let listed = list_procedures(&conn, &ProcedureFilter::default()).unwrap();
        for record in &listed {
            assert_eq!(
                record.utility,
                compute_utility(&record.payments, Decimal::ZERO, &record.expenses)
            );
        }
    }

    #[test]
    fn recompute_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let item_id = seed_catalog(&conn, "12.75");
        let record = create_procedure(&conn, input(Some(item_id))).unwrap();
        assert_eq!(recompute_utility(&conn, &record), recompute_utility(&conn, &record));
        assert_eq!(recompute_utility(&conn, &record), record.utility);
    }

    #[test]
    fn rejects_bad_date_and_negative_amounts() {
        let conn = open_memory_database().unwrap();
        let mut bad_date = input(None);
        bad_date.date = "05/01/2025".into();
        assert!(matches!(create_procedure(&conn, bad_date), Err(ProcedureError::Invalid(_))));

        let mut negative = input(None);
        negative.payments = PaymentAmounts::single(PaymentMethod::Cash, d("-1"));
        assert!(matches!(create_procedure(&conn, negative), Err(ProcedureError::Invalid(_))));
    }

    #[test]
    fn datetime_dates_are_kept_verbatim() {
        let conn = open_memory_database().unwrap();
        let mut with_time = input(None);
        with_time.date = "2025-01-05T23:00:00Z".into();
        let record = create_procedure(&conn, with_time).unwrap();
        assert_eq!(record.date, "2025-01-05T23:00:00Z");
    }

    #[test]
    fn delete_removes_record() {
        let conn = open_memory_database().unwrap();
        let record = create_procedure(&conn, input(None)).unwrap();
        delete_procedure(&conn, &record.id).unwrap();
        assert!(get_procedure(&conn, &record.id).unwrap().is_none());
    }

    #[test]
    fn oversized_payments_are_rejected() {
        let conn = open_memory_database().unwrap();
        let mut huge = input(None);
        huge.payments = PaymentAmounts {
            yape: Some(Decimal::MAX),
            cash: Some(Decimal::MAX),
            ..Default::default()
        };
        let err = create_procedure(&conn, huge.clone()).unwrap_err();
        assert!(matches!(err, ProcedureError::Invalid(ref m) if m.contains("too large")));
        assert_eq!(huge.payments.checked_income(), None);
        assert_eq!(huge.payments.income(), Decimal::MAX);

        let mut huge_expenses = input(None);
        huge_expenses.expenses.fuel_expense = Some(Decimal::MAX);
        huge_expenses.expenses.extra_service_cost = Some(Decimal::MAX);
        assert!(matches!(create_procedure(&conn, huge_expenses), Err(ProcedureError::Invalid(_))));

        let record = create_procedure(&conn, input(None)).unwrap();
        assert!(matches!(
            update_procedure(&conn, &record.id, huge),
            Err(ProcedureError::Invalid(_))
        ));
        assert_eq!(get_procedure(&conn, &record.id).unwrap().unwrap().utility, Some(d("95")));
    }

    #[test]
    fn overflowing_historical_row_stays_unset() {
        let conn = open_memory_database().unwrap();
        let raw = insert_raw(
            &conn,
            None,
            PaymentAmounts { yape: Some(Decimal::MAX), plin: Some(Decimal::MAX), ..Default::default() },
        );
        let fetched = get_procedure(&conn, &raw.id).unwrap().unwrap();
        assert_eq!(fetched.utility, None);
    }

    #[test]
    fn surrounding_whitespace_in_date_is_accepted() {
        let conn = open_memory_database().unwrap();
        let mut padded = input(None);
        padded.date = " 2025-01-05 ".into();
        let record = create_procedure(&conn, padded).unwrap();
        assert_eq!(record.date, "2025-01-05");
    }
}
