use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A billable procedure or exam definition.
///
/// `total_cost` and `utility` are derived from the cost inputs and the
/// material list; they are rewritten on every save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub name: String,
    pub base_price: Decimal,
    pub labor_cost: Decimal,
    pub mobility_cost: Decimal,
    pub total_cost: Decimal,
    pub utility: Decimal,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(default)]
    pub materials: Vec<CatalogMaterial>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMaterial {
    pub id: Uuid,
    pub catalog_item_id: Uuid,
    pub name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub sort_order: i32,
}

/// One material line as entered on the catalog form. Names may repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

/// Create/update payload for a catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItemInput {
    pub name: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub labor_cost: Decimal,
    #[serde(default)]
    pub mobility_cost: Decimal,
    #[serde(default)]
    pub materials: Vec<MaterialLine>,
}

/// Entry of the master list of material names used for autocomplete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownMaterial {
    pub id: Uuid,
    pub name: String,
}
