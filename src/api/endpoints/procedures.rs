//! Procedure record endpoints. Utility is computed server-side on every
//! write and backfilled on read; any client-sent value is ignored.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, PageQuery};
use crate::costing;
use crate::db::repository::count_procedure_records;
use crate::models::{ProcedureFilter, ProcedureInput, ProcedureRecord};

#[derive(Deserialize)]
pub struct ProcedureListQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub patient_id: Option<Uuid>,
    pub catalog_item_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize)]
pub struct ProcedureListResponse {
    pub records: Vec<ProcedureRecord>,
    pub total: i64,
}

/// `GET /api/procedures`: newest first, paginated (50 per page by default).
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ProcedureListQuery>,
) -> Result<Json<ProcedureListResponse>, ApiError> {
    let page = PageQuery { page: query.page, per_page: query.per_page }
        .page()
        .unwrap_or_default();
    let filter = ProcedureFilter {
        date_from: query.date_from,
        date_to: query.date_to,
        patient_id: query.patient_id,
        catalog_item_id: query.catalog_item_id,
        page: Some(page),
    };

    let conn = ctx.core.open_db()?;
    let records = costing::list_procedures(&conn, &filter)?;
    let total = count_procedure_records(&conn, &filter)?;
    Ok(Json(ProcedureListResponse { records, total }))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Json(input): Json<ProcedureInput>,
) -> Result<(StatusCode, Json<ProcedureRecord>), ApiError> {
    let conn = ctx.core.open_db()?;
    let record = costing::create_procedure(&conn, input)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<ProcedureRecord>, ApiError> {
    let id = parse_id(&id, "procedure")?;
    let conn = ctx.core.open_db()?;
    let record = costing::get_procedure(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("Procedure not found".into()))?;
    Ok(Json(record))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(input): Json<ProcedureInput>,
) -> Result<Json<ProcedureRecord>, ApiError> {
    let id = parse_id(&id, "procedure")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(costing::update_procedure(&conn, &id, input)?))
}

pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "procedure")?;
    let conn = ctx.core.open_db()?;
    costing::delete_procedure(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
