use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::columns::uuid_from_sql;
use crate::db::DatabaseError;
use crate::models::KnownMaterial;

use super::format_timestamp;

/// Insert a name into the master material list unless it already exists.
/// Returns `true` when a new row was written.
pub fn insert_known_material_if_missing(
    conn: &Connection,
    name: &str,
    now: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO known_materials (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![Uuid::new_v4().to_string(), name, format_timestamp(now)],
    )?;
    Ok(inserted > 0)
}

/// Autocomplete lookup: names starting with `prefix`, case-insensitive.
pub fn search_known_materials(
    conn: &Connection,
    prefix: &str,
    limit: u32,
) -> Result<Vec<KnownMaterial>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name FROM known_materials
         WHERE name LIKE ?1 ESCAPE '\\'
         ORDER BY name COLLATE NOCASE ASC LIMIT ?2",
    )?;
    let pattern = format!("{}%", escape_like(prefix.trim()));
    let rows = stmt.query_map(params![pattern, limit], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut materials = Vec::new();
    for row in rows {
        let (id, name) = row?;
        materials.push(KnownMaterial { id: uuid_from_sql(&id)?, name });
    }
    Ok(materials)
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
