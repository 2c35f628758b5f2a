//! Catalog maintenance: items, their material lists and derived costs.
//!
//! On every save the material list is merged by name, the item's total
//! cost and utility are recomputed, and the full material set is replaced.
//! The item row and its materials are written in one transaction; the
//! known-materials list is updated after commit on a best-effort basis.

use std::collections::HashMap;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository::{
    get_catalog_item as fetch_catalog_item, insert_catalog_item,
    insert_known_material_if_missing, list_catalog_items as fetch_catalog_items,
    now_timestamp, replace_catalog_materials, set_catalog_item_active, update_catalog_item_row,
};
use crate::db::DatabaseError;
use crate::models::*;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Invalid catalog item: {0}")]
    Invalid(String),
}

/// A material after duplicate names were folded together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedMaterial {
    pub name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

impl MergedMaterial {
    /// `None` when the product overflows.
    pub fn line_cost(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_cost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CatalogCosts {
    pub material_cost: Decimal,
    pub total_cost: Decimal,
    pub utility: Decimal,
}

/// Fold material lines by trimmed name.
///
/// Quantities of repeated names are summed; the unit cost of the first
/// occurrence wins. Output order is first-occurrence order. Blank names
/// are dropped.
pub fn merge_materials(lines: &[MaterialLine]) -> Result<Vec<MergedMaterial>, CatalogError> {
    let mut merged: Vec<MergedMaterial> = Vec::with_capacity(lines.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in lines {
        let name = line.name.trim();
        if name.is_empty() {
            continue;
        }
        match index.get(name) {
            Some(&pos) => {
                let entry = &mut merged[pos];
                entry.quantity = entry
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| too_large(name))?;
            }
            None => {
                index.insert(name.to_string(), merged.len());
                merged.push(MergedMaterial {
                    name: name.to_string(),
                    quantity: line.quantity,
                    unit_cost: line.unit_cost,
                });
            }
        }
    }
    Ok(merged)
}

fn too_large(what: &str) -> CatalogError {
    CatalogError::Invalid(format!("amount too large: {what}"))
}

pub fn compute_costs(
    base_price: Decimal,
    labor_cost: Decimal,
    mobility_cost: Decimal,
    materials: &[MergedMaterial],
) -> Result<CatalogCosts, CatalogError> {
    let mut material_cost = Decimal::ZERO;
    for material in materials {
        material_cost = material
            .line_cost()
            .and_then(|cost| material_cost.checked_add(cost))
            .ok_or_else(|| too_large(&material.name))?;
    }
    let total_cost = labor_cost
        .checked_add(mobility_cost)
        .and_then(|v| v.checked_add(material_cost))
        .ok_or_else(|| too_large("total cost"))?;
    let utility = base_price
        .checked_sub(total_cost)
        .ok_or_else(|| too_large("utility"))?;
    Ok(CatalogCosts {
        material_cost,
        total_cost,
        utility,
    })
}

fn validate(input: &CatalogItemInput) -> Result<(), CatalogError> {
    if input.name.trim().is_empty() {
        return Err(CatalogError::Invalid("name is required".into()));
    }
    let negative = |v: &Decimal| v.is_sign_negative() && !v.is_zero();
    if negative(&input.base_price) || negative(&input.labor_cost) || negative(&input.mobility_cost) {
        return Err(CatalogError::Invalid("prices and costs cannot be negative".into()));
    }
    if input
        .materials
        .iter()
        .any(|m| negative(&m.quantity) || negative(&m.unit_cost))
    {
        return Err(CatalogError::Invalid("material quantities and costs cannot be negative".into()));
    }
    Ok(())
}

fn to_materials(item_id: Uuid, merged: &[MergedMaterial]) -> Vec<CatalogMaterial> {
    merged
        .iter()
        .enumerate()
        .map(|(i, m)| CatalogMaterial {
            id: Uuid::new_v4(),
            catalog_item_id: item_id,
            name: m.name.clone(),
            quantity: m.quantity,
            unit_cost: m.unit_cost,
            sort_order: i as i32,
        })
        .collect()
}

/// Create an item with its merged materials.
pub fn create_catalog_item(conn: &Connection, input: CatalogItemInput) -> Result<CatalogItem, CatalogError> {
    validate(&input)?;
    let merged = merge_materials(&input.materials)?;
    let costs = compute_costs(input.base_price, input.labor_cost, input.mobility_cost, &merged)?;
    let now = now_timestamp();
    let id = Uuid::new_v4();

    let item = CatalogItem {
        id,
        name: input.name.trim().to_string(),
        base_price: input.base_price,
        labor_cost: input.labor_cost,
        mobility_cost: input.mobility_cost,
        total_cost: costs.total_cost,
        utility: costs.utility,
        is_active: true,
        created_at: now,
        updated_at: now,
        materials: to_materials(id, &merged),
    };

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    insert_catalog_item(&tx, &item)?;
    replace_catalog_materials(&tx, &item.id, &item.materials)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(id = %item.id, total_cost = %item.total_cost, "Catalog item created");
    sync_known_materials(conn, merged.iter().map(|m| m.name.as_str()));
    Ok(item)
}

/// Update an item and replace its whole material set. Material ids are
/// regenerated; only the item id is stable across edits.
pub fn update_catalog_item(
    conn: &Connection,
    id: &Uuid,
    input: CatalogItemInput,
) -> Result<CatalogItem, CatalogError> {
    validate(&input)?;
    let existing = fetch_catalog_item(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "catalog_item".into(),
        id: id.to_string(),
    })?;

    let merged = merge_materials(&input.materials)?;
    let costs = compute_costs(input.base_price, input.labor_cost, input.mobility_cost, &merged)?;

    let item = CatalogItem {
        id: existing.id,
        name: input.name.trim().to_string(),
        base_price: input.base_price,
        labor_cost: input.labor_cost,
        mobility_cost: input.mobility_cost,
        total_cost: costs.total_cost,
        utility: costs.utility,
        is_active: existing.is_active,
        created_at: existing.created_at,
        updated_at: now_timestamp(),
        materials: to_materials(existing.id, &merged),
    };

    // Any failure rolls back to the previous row and material set.
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    update_catalog_item_row(&tx, &item)?;
    replace_catalog_materials(&tx, &item.id, &item.materials)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(id = %item.id, total_cost = %item.total_cost, "Catalog item updated");
    sync_known_materials(conn, merged.iter().map(|m| m.name.as_str()));
    Ok(item)
}

/// Soft delete. There is no hard-delete path.
pub fn deactivate_catalog_item(conn: &Connection, id: &Uuid) -> Result<(), CatalogError> {
    set_catalog_item_active(conn, id, false, &now_timestamp())?;
    tracing::info!(id = %id, "Catalog item deactivated");
    Ok(())
}

pub fn get_catalog_item(conn: &Connection, id: &Uuid) -> Result<Option<CatalogItem>, CatalogError> {
    Ok(fetch_catalog_item(conn, id)?)
}

pub fn list_catalog_items(conn: &Connection, filter: &CatalogFilter) -> Result<Vec<CatalogItem>, CatalogError> {
    Ok(fetch_catalog_items(conn, filter)?)
}

/// Record material names in the master list. Runs after the catalog
/// save committed; failures are logged and never surface.
pub fn sync_known_materials<'a>(conn: &Connection, names: impl IntoIterator<Item = &'a str>) -> usize {
    let now = now_timestamp();
    let mut added = 0;
    for name in names {
        match insert_known_material_if_missing(conn, name, &now) {
            Ok(true) => added += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!(material = name, error = %e, "Failed to record known material"),
        }
    }
    if added > 0 {
        tracing::debug!(added, "Known materials updated");
    }
    added
}
