//! `POST /api/quotes`: price a selection of lab exams for a home visit.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::get_lab_exams_by_ids;
use crate::quote::{compute_quote, resolve_surcharge, ExamQuote, QuoteExam};

#[derive(Deserialize)]
pub struct QuoteRequest {
    /// Catalog exams to include.
    #[serde(default)]
    pub exam_ids: Vec<Uuid>,
    /// Ad-hoc exams not in the catalog.
    #[serde(default)]
    pub exams: Vec<QuoteExam>,
}

pub async fn compute(
    State(ctx): State<ApiContext>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<ExamQuote>, ApiError> {
    let conn = ctx.core.open_db()?;

    let found = get_lab_exams_by_ids(&conn, &request.exam_ids)?;
    if found.len() != request.exam_ids.len() {
        tracing::warn!(
            requested = request.exam_ids.len(),
            found = found.len(),
            "Some quoted exams no longer exist"
        );
    }

    let mut selection: Vec<QuoteExam> = found.iter().map(QuoteExam::from).collect();
    selection.extend(request.exams);

    let surcharge = resolve_surcharge(&conn, &ctx.core.quote);
    Ok(Json(compute_quote(&selection, surcharge, &ctx.core.quote)))
}
