//! Lab exam catalog endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{insert_lab_exam, list_lab_exams};
use crate::models::{LabExam, LabExamInput};

#[derive(Deserialize)]
pub struct LabExamQuery {
    pub q: Option<String>,
}

/// `GET /api/lab-exams?q=`: active exams, optionally filtered by code or name.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<LabExamQuery>,
) -> Result<Json<Vec<LabExam>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    Ok(Json(list_lab_exams(&conn, search)?))
}

/// `POST /api/lab-exams`. The price is stored as typed.
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(input): Json<LabExamInput>,
) -> Result<(StatusCode, Json<LabExam>), ApiError> {
    if input.code.trim().is_empty() || input.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Exam code and name are required".into()));
    }
    let exam = LabExam {
        id: Uuid::new_v4(),
        code: input.code.trim().to_string(),
        name: input.name.trim().to_string(),
        price: input.price,
        is_active: true,
    };
    let conn = ctx.core.open_db()?;
    insert_lab_exam(&conn, &exam)?;
    tracing::info!(id = %exam.id, code = %exam.code, "Lab exam created");
    Ok((StatusCode::CREATED, Json(exam)))
}
