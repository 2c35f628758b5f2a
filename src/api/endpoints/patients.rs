//! Patient endpoints.
//!
//! `GET /api/patients/search?q=&client=` is the typeahead: requests are
//! debounced, and a newer query from the same `client` answers the older
//! one with `409 SUPERSEDED`. Requests without `client` are never
//! superseded.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, PageQuery};
use crate::db;
use crate::db::repository::{get_patient, insert_patient, list_patients, now_timestamp};
use crate::models::{Page, Patient, PatientFilter, PatientInput};

const SEARCH_RESULTS: u32 = 20;

#[derive(Deserialize)]
pub struct PatientListQuery {
    pub q: Option<String>,
    #[serde(default)]
    pub active_only: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let filter = PatientFilter {
        name_contains: query.q,
        active_only: query.active_only,
        page: PageQuery { page: query.page, per_page: query.per_page }.page(),
    };
    Ok(Json(list_patients(&conn, &filter)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Json(input): Json<PatientInput>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let full_name = input.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ApiError::BadRequest("Patient name is required".into()));
    }
    let blank_to_none = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let patient = Patient {
        id: Uuid::new_v4(),
        full_name,
        document_number: blank_to_none(input.document_number),
        phone: blank_to_none(input.phone),
        address: blank_to_none(input.address),
        is_active: true,
        created_at: now_timestamp(),
    };
    let conn = ctx.core.open_db()?;
    insert_patient(&conn, &patient)?;
    tracing::info!(id = %patient.id, "Patient created");
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id, "patient")?;
    let conn = ctx.core.open_db()?;
    let patient = get_patient(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    Ok(Json(patient))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub client: Option<String>,
}

pub async fn search(
    State(ctx): State<ApiContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let db_path = ctx.core.db_path.clone();
    let needle = query.q.trim().to_string();

    let searcher = ctx.core.patient_search.for_client(query.client.as_deref())?;
    let found = searcher
        .run(move || async move {
            let conn = db::open_database(&db_path)?;
            list_patients(&conn, &PatientFilter {
                name_contains: Some(needle),
                active_only: true,
                page: Some(Page::new(1, SEARCH_RESULTS)),
            })
        })
        .await??;
    Ok(Json(found))
}
