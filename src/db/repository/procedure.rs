use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::columns::{decimal_to_sql, opt_decimal_from_sql, opt_decimal_to_sql, uuid_from_sql};
use crate::db::DatabaseError;
use crate::models::*;

use super::{format_timestamp, parse_timestamp};

const PROCEDURE_COLUMNS: &str = "id, date, patient_id, catalog_item_id, quantity,
     yape, plin, transfer, card, cash, material_expense, fuel_expense,
     extra_service_cost, utility, note, created_at, updated_at";

pub fn insert_procedure_record(
    conn: &Connection,
    record: &ProcedureRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO procedure_records (id, date, patient_id, catalog_item_id, quantity,
         yape, plin, transfer, card, cash, material_expense, fuel_expense,
         extra_service_cost, utility, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            record.id.to_string(),
            record.date,
            record.patient_id.map(|id| id.to_string()),
            record.catalog_item_id.map(|id| id.to_string()),
            record.quantity,
            opt_decimal_to_sql(&record.payments.yape),
            opt_decimal_to_sql(&record.payments.plin),
            opt_decimal_to_sql(&record.payments.transfer),
            opt_decimal_to_sql(&record.payments.card),
            opt_decimal_to_sql(&record.payments.cash),
            opt_decimal_to_sql(&record.expenses.material_expense),
            opt_decimal_to_sql(&record.expenses.fuel_expense),
            opt_decimal_to_sql(&record.expenses.extra_service_cost),
            opt_decimal_to_sql(&record.utility),
            record.note,
            format_timestamp(&record.created_at),
            format_timestamp(&record.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_procedure_record(
    conn: &Connection,
    record: &ProcedureRecord,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE procedure_records SET date = ?2, patient_id = ?3, catalog_item_id = ?4,
         quantity = ?5, yape = ?6, plin = ?7, transfer = ?8, card = ?9, cash = ?10,
         material_expense = ?11, fuel_expense = ?12, extra_service_cost = ?13,
         utility = ?14, note = ?15, updated_at = ?16
         WHERE id = ?1",
        params![
            record.id.to_string(),
            record.date,
            record.patient_id.map(|id| id.to_string()),
            record.catalog_item_id.map(|id| id.to_string()),
            record.quantity,
            opt_decimal_to_sql(&record.payments.yape),
            opt_decimal_to_sql(&record.payments.plin),
            opt_decimal_to_sql(&record.payments.transfer),
            opt_decimal_to_sql(&record.payments.card),
            opt_decimal_to_sql(&record.payments.cash),
            opt_decimal_to_sql(&record.expenses.material_expense),
            opt_decimal_to_sql(&record.expenses.fuel_expense),
            opt_decimal_to_sql(&record.expenses.extra_service_cost),
            opt_decimal_to_sql(&record.utility),
            record.note,
            format_timestamp(&record.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "procedure_record".into(),
            id: record.id.to_string(),
        });
    }
    Ok(())
}

/// Persist a lazily computed utility without touching `updated_at`.
pub fn set_procedure_utility(
    conn: &Connection,
    id: &Uuid,
    utility: &Decimal,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE procedure_records SET utility = ?2 WHERE id = ?1 AND utility IS NULL",
        params![id.to_string(), decimal_to_sql(utility)],
    )?;
    Ok(())
}

pub fn delete_procedure_record(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM procedure_records WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "procedure_record".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn get_procedure_record(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<ProcedureRecord>, DatabaseError> {
    let sql = format!("SELECT {PROCEDURE_COLUMNS} FROM procedure_records WHERE id = ?1");
    let raw = conn
        .query_row(&sql, params![id.to_string()], read_procedure_row)
        .optional()?;
    raw.map(RawProcedureRow::into_record).transpose()
}

/// Filtered listing, newest first. Date bounds compare the day key
/// (first 10 characters) so date-times and plain dates mix freely.
pub fn list_procedure_records(
    conn: &Connection,
    filter: &ProcedureFilter,
) -> Result<Vec<ProcedureRecord>, DatabaseError> {
    let (where_sql, args) = procedure_where(filter);
    let mut sql = format!(
        "SELECT {PROCEDURE_COLUMNS} FROM procedure_records{where_sql} ORDER BY date DESC, created_at DESC"
    );
    if let Some(page) = filter.page {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit(), page.offset()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), read_procedure_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

/// Row count for the same filter, ignoring pagination.
pub fn count_procedure_records(
    conn: &Connection,
    filter: &ProcedureFilter,
) -> Result<i64, DatabaseError> {
    let (where_sql, args) = procedure_where(filter);
    let sql = format!("SELECT COUNT(*) FROM procedure_records{where_sql}");
    let count = conn.query_row(&sql, rusqlite::params_from_iter(args.iter()), |row| row.get(0))?;
    Ok(count)
}

fn procedure_where(filter: &ProcedureFilter) -> (String, Vec<String>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<String> = Vec::new();

    if let Some(ref from) = filter.date_from {
        args.push(from.clone());
        clauses.push(format!("substr(date, 1, 10) >= ?{}", args.len()));
    }
    if let Some(ref to) = filter.date_to {
        args.push(to.clone());
        clauses.push(format!("substr(date, 1, 10) <= ?{}", args.len()));
    }
    if let Some(ref patient_id) = filter.patient_id {
        args.push(patient_id.to_string());
        clauses.push(format!("patient_id = ?{}", args.len()));
    }
    if let Some(ref item_id) = filter.catalog_item_id {
        args.push(item_id.to_string());
        clauses.push(format!("catalog_item_id = ?{}", args.len()));
    }

    if clauses.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), args)
    }
}

struct RawProcedureRow {
    id: String,
    date: String,
    patient_id: Option<String>,
    catalog_item_id: Option<String>,
    quantity: i32,
    yape: Option<String>,
    plin: Option<String>,
    transfer: Option<String>,
    card: Option<String>,
    cash: Option<String>,
    material_expense: Option<String>,
    fuel_expense: Option<String>,
    extra_service_cost: Option<String>,
    utility: Option<String>,
    note: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_procedure_row(row: &Row<'_>) -> rusqlite::Result<RawProcedureRow> {
    Ok(RawProcedureRow {
        id: row.get(0)?,
        date: row.get(1)?,
        patient_id: row.get(2)?,
        catalog_item_id: row.get(3)?,
        quantity: row.get(4)?,
        yape: row.get(5)?,
        plin: row.get(6)?,
        transfer: row.get(7)?,
        card: row.get(8)?,
        cash: row.get(9)?,
        material_expense: row.get(10)?,
        fuel_expense: row.get(11)?,
        extra_service_cost: row.get(12)?,
        utility: row.get(13)?,
        note: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

impl RawProcedureRow {
    fn into_record(self) -> Result<ProcedureRecord, DatabaseError> {
        Ok(ProcedureRecord {
            id: uuid_from_sql(&self.id)?,
            date: self.date,
            patient_id: self.patient_id.as_deref().map(uuid_from_sql).transpose()?,
            // Stale ids are kept as-is; costing treats them as zero cost.
            catalog_item_id: self.catalog_item_id.and_then(|s| Uuid::parse_str(&s).ok()),
            quantity: self.quantity,
            payments: PaymentAmounts {
                yape: opt_decimal_from_sql("yape", self.yape)?,
                plin: opt_decimal_from_sql("plin", self.plin)?,
                transfer: opt_decimal_from_sql("transfer", self.transfer)?,
                card: opt_decimal_from_sql("card", self.card)?,
                cash: opt_decimal_from_sql("cash", self.cash)?,
            },
            expenses: ProcedureExpenses {
                material_expense: opt_decimal_from_sql("material_expense", self.material_expense)?,
                fuel_expense: opt_decimal_from_sql("fuel_expense", self.fuel_expense)?,
                extra_service_cost: opt_decimal_from_sql(
                    "extra_service_cost",
                    self.extra_service_cost,
                )?,
            },
            utility: opt_decimal_from_sql("utility", self.utility)?,
            note: self.note,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}
