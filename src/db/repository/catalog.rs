use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::columns::{decimal_from_sql, decimal_to_sql, uuid_from_sql};
use crate::db::DatabaseError;
use crate::models::*;

use super::{format_timestamp, parse_timestamp};

const CATALOG_COLUMNS: &str = "id, name, base_price, labor_cost, mobility_cost, total_cost,
     utility, is_active, created_at, updated_at";

pub fn insert_catalog_item(conn: &Connection, item: &CatalogItem) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO catalog_items (id, name, base_price, labor_cost, mobility_cost,
         total_cost, utility, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            item.id.to_string(),
            item.name,
            decimal_to_sql(&item.base_price),
            decimal_to_sql(&item.labor_cost),
            decimal_to_sql(&item.mobility_cost),
            decimal_to_sql(&item.total_cost),
            decimal_to_sql(&item.utility),
            item.is_active as i32,
            format_timestamp(&item.created_at),
            format_timestamp(&item.updated_at),
        ],
    )?;
    Ok(())
}

/// Rewrite the item row (not its materials). Fails with `NotFound` when
/// no row has the given id.
pub fn update_catalog_item_row(conn: &Connection, item: &CatalogItem) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE catalog_items SET name = ?2, base_price = ?3, labor_cost = ?4,
         mobility_cost = ?5, total_cost = ?6, utility = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            item.id.to_string(),
            item.name,
            decimal_to_sql(&item.base_price),
            decimal_to_sql(&item.labor_cost),
            decimal_to_sql(&item.mobility_cost),
            decimal_to_sql(&item.total_cost),
            decimal_to_sql(&item.utility),
            format_timestamp(&item.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "catalog_item".into(),
            id: item.id.to_string(),
        });
    }
    Ok(())
}

pub fn set_catalog_item_active(
    conn: &Connection,
    id: &Uuid,
    active: bool,
    now: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE catalog_items SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), active as i32, format_timestamp(now)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "catalog_item".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Fetch one catalog item with its materials. Inactive items resolve too:
/// historical procedure records still point at them.
pub fn get_catalog_item(conn: &Connection, id: &Uuid) -> Result<Option<CatalogItem>, DatabaseError> {
    let sql = format!("SELECT {CATALOG_COLUMNS} FROM catalog_items WHERE id = ?1");
    let raw = conn
        .query_row(&sql, params![id.to_string()], read_catalog_row)
        .optional()?;

    match raw {
        Some(raw) => {
            let mut item = raw.into_item()?;
            item.materials = get_catalog_materials(conn, &item.id)?;
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

/// Just the stored total cost, for procedure costing.
pub fn get_catalog_total_cost(conn: &Connection, id: &Uuid) -> Result<Option<Decimal>, DatabaseError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT total_cost FROM catalog_items WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|s| decimal_from_sql("total_cost", &s)).transpose()
}

/// `(id, name)` for every item, active or not, for report labelling.
pub fn catalog_item_names(conn: &Connection) -> Result<Vec<(Uuid, String)>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name FROM catalog_items")?;
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

/// Case-insensitive lookup of an active item by exact (trimmed) name.
pub fn find_active_catalog_item_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<CatalogItem>, DatabaseError> {
    let sql = format!(
        "SELECT {CATALOG_COLUMNS} FROM catalog_items
         WHERE is_active = 1 AND lower(trim(name)) = lower(trim(?1))
         ORDER BY created_at ASC LIMIT 1"
    );
    let raw = conn.query_row(&sql, params![name], read_catalog_row).optional()?;
    raw.map(RawCatalogRow::into_item).transpose()
}

pub fn list_catalog_items(
    conn: &Connection,
    filter: &CatalogFilter,
) -> Result<Vec<CatalogItem>, DatabaseError> {
    let mut sql = format!("SELECT {CATALOG_COLUMNS} FROM catalog_items WHERE 1=1");
    let mut args: Vec<String> = Vec::new();

    if filter.active_only {
        sql.push_str(" AND is_active = 1");
    }
    if let Some(ref needle) = filter.name_contains {
        args.push(format!("%{}%", needle.trim()));
        sql.push_str(&format!(" AND name LIKE ?{}", args.len()));
    }
    sql.push_str(" ORDER BY name COLLATE NOCASE ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), read_catalog_row)?;

    let mut items = Vec::new();
    for row in rows {
        let mut item = row?.into_item()?;
        item.materials = get_catalog_materials(conn, &item.id)?;
        items.push(item);
    }
    Ok(items)
}

pub fn get_catalog_materials(
    conn: &Connection,
    catalog_item_id: &Uuid,
) -> Result<Vec<CatalogMaterial>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, catalog_item_id, name, quantity, unit_cost, sort_order
         FROM catalog_materials WHERE catalog_item_id = ?1 ORDER BY sort_order ASC",
    )?;

    let rows = stmt.query_map(params![catalog_item_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i32>(5)?,
        ))
    })?;

    let mut materials = Vec::new();
    for row in rows {
        let (id, item_id, name, quantity, unit_cost, sort_order) = row?;
        materials.push(CatalogMaterial {
            id: uuid_from_sql(&id)?,
            catalog_item_id: uuid_from_sql(&item_id)?,
            name,
            quantity: decimal_from_sql("quantity", &quantity)?,
            unit_cost: decimal_from_sql("unit_cost", &unit_cost)?,
            sort_order,
        });
    }
    Ok(materials)
}

/// Delete every material of the item, then insert the given set.
/// Callers wrap this in a transaction together with the item row.
pub fn replace_catalog_materials(
    conn: &Connection,
    catalog_item_id: &Uuid,
    materials: &[CatalogMaterial],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM catalog_materials WHERE catalog_item_id = ?1",
        params![catalog_item_id.to_string()],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO catalog_materials (id, catalog_item_id, name, quantity, unit_cost, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for material in materials {
        stmt.execute(params![
            material.id.to_string(),
            catalog_item_id.to_string(),
            material.name,
            decimal_to_sql(&material.quantity),
            decimal_to_sql(&material.unit_cost),
            material.sort_order,
        ])?;
    }
    Ok(())
}

struct RawCatalogRow {
    id: String,
    name: String,
    base_price: String,
    labor_cost: String,
    mobility_cost: String,
    total_cost: String,
    utility: String,
    is_active: i32,
    created_at: String,
    updated_at: String,
}

fn read_catalog_row(row: &Row<'_>) -> rusqlite::Result<RawCatalogRow> {
    Ok(RawCatalogRow {
        id: row.get(0)?,
        name: row.get(1)?,
        base_price: row.get(2)?,
        labor_cost: row.get(3)?,
        mobility_cost: row.get(4)?,
        total_cost: row.get(5)?,
        utility: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl RawCatalogRow {
    fn into_item(self) -> Result<CatalogItem, DatabaseError> {
        Ok(CatalogItem {
            id: uuid_from_sql(&self.id)?,
            name: self.name,
            base_price: decimal_from_sql("base_price", &self.base_price)?,
            labor_cost: decimal_from_sql("labor_cost", &self.labor_cost)?,
            mobility_cost: decimal_from_sql("mobility_cost", &self.mobility_cost)?,
            total_cost: decimal_from_sql("total_cost", &self.total_cost)?,
            utility: decimal_from_sql("utility", &self.utility)?,
            is_active: self.is_active != 0,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            materials: Vec::new(),
        })
    }
}
