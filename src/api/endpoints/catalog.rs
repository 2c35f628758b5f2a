//! Catalog endpoints.
//!
//! - `GET /api/catalog`: list, `?active_only=true&q=` for selectable lists
//! - `POST /api/catalog`: create with materials
//! - `GET /api/catalog/:id`: detail, inactive items included
//! - `PUT /api/catalog/:id`: replace fields and the whole material set
//! - `DELETE /api/catalog/:id`: soft delete
//! - `GET /api/materials?q=`: known-material autocomplete

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::catalog;
use crate::db::repository::search_known_materials;
use crate::models::{CatalogFilter, CatalogItem, CatalogItemInput, KnownMaterial};

const MATERIAL_SUGGESTIONS: u32 = 20;

#[derive(Deserialize)]
pub struct CatalogListQuery {
    #[serde(default)]
    pub active_only: bool,
    pub q: Option<String>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<CatalogListQuery>,
) -> Result<Json<Vec<CatalogItem>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let filter = CatalogFilter {
        active_only: query.active_only,
        name_contains: query.q.filter(|q| !q.trim().is_empty()),
    };
    Ok(Json(catalog::list_catalog_items(&conn, &filter)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Json(input): Json<CatalogItemInput>,
) -> Result<(StatusCode, Json<CatalogItem>), ApiError> {
    let conn = ctx.core.open_db()?;
    let item = catalog::create_catalog_item(&conn, input)?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<CatalogItem>, ApiError> {
    let id = parse_id(&id, "catalog item")?;
    let conn = ctx.core.open_db()?;
    let item = catalog::get_catalog_item(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("Catalog item not found".into()))?;
    Ok(Json(item))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(input): Json<CatalogItemInput>,
) -> Result<Json<CatalogItem>, ApiError> {
    let id = parse_id(&id, "catalog item")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(catalog::update_catalog_item(&conn, &id, input)?))
}

pub async fn deactivate(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "catalog item")?;
    let conn = ctx.core.open_db()?;
    catalog::deactivate_catalog_item(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct MaterialQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

pub async fn materials(
    State(ctx): State<ApiContext>,
    Query(query): Query<MaterialQuery>,
) -> Result<Json<Vec<KnownMaterial>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let limit = query.limit.unwrap_or(MATERIAL_SUGGESTIONS).clamp(1, 100);
    Ok(Json(search_known_materials(&conn, &query.q, limit)?))
}
