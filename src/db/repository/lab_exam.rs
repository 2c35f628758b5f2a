use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::columns::uuid_from_sql;
use crate::db::DatabaseError;
use crate::models::LabExam;

pub fn insert_lab_exam(conn: &Connection, exam: &LabExam) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO lab_exams (id, code, name, price, is_active) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            exam.id.to_string(),
            exam.code,
            exam.name,
            exam.price,
            exam.is_active as i32,
        ],
    )?;
    Ok(())
}

/// Active exams, optionally narrowed by a code/name pattern.
pub fn list_lab_exams(conn: &Connection, search: Option<&str>) -> Result<Vec<LabExam>, DatabaseError> {
    let pattern = format!("%{}%", search.unwrap_or("").trim());
    let mut stmt = conn.prepare(
        "SELECT id, code, name, price, is_active FROM lab_exams
         WHERE is_active = 1 AND (code LIKE ?1 OR name LIKE ?1)
         ORDER BY name COLLATE NOCASE ASC",
    )?;
    let rows = stmt.query_map(params![pattern], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i32>(4)?,
        ))
    })?;

    let mut exams = Vec::new();
    for row in rows {
        let (id, code, name, price, is_active) = row?;
        exams.push(LabExam {
            id: uuid_from_sql(&id)?,
            code,
            name,
            price,
            is_active: is_active != 0,
        });
    }
    Ok(exams)
}

/// Resolve a selection of exam ids, preserving the requested order and
/// skipping ids that do not exist.
pub fn get_lab_exams_by_ids(conn: &Connection, ids: &[Uuid]) -> Result<Vec<LabExam>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, code, name, price, is_active FROM lab_exams WHERE id = ?1",
    )?;
    let mut exams = Vec::with_capacity(ids.len());
    for id in ids {
        let mut rows = stmt.query(params![id.to_string()])?;
        if let Some(row) = rows.next()? {
            exams.push(LabExam {
                id: *id,
                code: row.get(1)?,
                name: row.get(2)?,
                price: row.get(3)?,
                is_active: row.get::<_, i32>(4)? != 0,
            });
        }
    }
    Ok(exams)
}
