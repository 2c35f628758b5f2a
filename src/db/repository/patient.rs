use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::columns::uuid_from_sql;
use crate::db::DatabaseError;
use crate::models::*;

use super::{format_timestamp, parse_timestamp};

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, full_name, document_number, phone, address, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            patient.id.to_string(),
            patient.full_name,
            patient.document_number,
            patient.phone,
            patient.address,
            patient.is_active as i32,
            format_timestamp(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        "SELECT id, full_name, document_number, phone, address, is_active, created_at
         FROM patients WHERE id = ?1",
        params![id.to_string()],
        read_patient_row,
    )
    .optional()?
    .map(RawPatientRow::into_patient)
    .transpose()
}

/// Name search used by search-as-you-type. Matches anywhere in the name
/// or the document number.
pub fn list_patients(conn: &Connection, filter: &PatientFilter) -> Result<Vec<Patient>, DatabaseError> {
    let pattern = format!("%{}%", filter.name_contains.as_deref().unwrap_or("").trim());
    let mut sql = String::from(
        "SELECT id, full_name, document_number, phone, address, is_active, created_at
         FROM patients WHERE (full_name LIKE ?1 OR IFNULL(document_number, '') LIKE ?1)",
    );
    if filter.active_only {
        sql.push_str(" AND is_active = 1");
    }
    sql.push_str(" ORDER BY full_name COLLATE NOCASE ASC");
    if let Some(page) = filter.page {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit(), page.offset()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pattern], read_patient_row)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(row?.into_patient()?);
    }
    Ok(patients)
}

/// `(id, full_name)` pairs for every patient, for report labelling.
pub fn patient_names(conn: &Connection) -> Result<Vec<(Uuid, String)>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, full_name FROM patients")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut names = Vec::new();
    for row in rows {
        let (id, name) = row?;
        names.push((uuid_from_sql(&id)?, name));
    }
    Ok(names)
}

struct RawPatientRow {
    id: String,
    full_name: String,
    document_number: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    is_active: i32,
    created_at: String,
}

fn read_patient_row(row: &Row<'_>) -> rusqlite::Result<RawPatientRow> {
    Ok(RawPatientRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        document_number: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl RawPatientRow {
    fn into_patient(self) -> Result<Patient, DatabaseError> {
        Ok(Patient {
            id: uuid_from_sql(&self.id)?,
            full_name: self.full_name,
            document_number: self.document_number,
            phone: self.phone,
            address: self.address,
            is_active: self.is_active != 0,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}
