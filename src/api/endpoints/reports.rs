//! Report endpoints.
//!
//! - `GET /api/reports/summary`: totals, daily series and rankings
//! - `GET /api/reports/csv`: the matching rows as a CSV download

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::report::{self, ReportQuery, ReportSummary};

pub async fn summary(
    State(ctx): State<ApiContext>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportSummary>, ApiError> {
    let rows = {
        let conn = ctx.core.open_db()?;
        report::load_report_rows(&conn, &query)?
    };
    let summary = report::build_report_with_rpc(ctx.core.rpc.as_deref(), &query, &rows).await;
    Ok(Json(summary))
}

pub async fn csv(
    State(ctx): State<ApiContext>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let conn = ctx.core.open_db()?;
    let rows = report::load_report_rows(&conn, &query)?;
    let body = report::to_csv_string(&rows).map_err(report::ReportError::from)?;

    let filename = format!(
        "reporte_{}_{}.csv",
        query.date_from.as_deref().unwrap_or("inicio"),
        query.date_to.as_deref().unwrap_or("hoy"),
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    ))
}
