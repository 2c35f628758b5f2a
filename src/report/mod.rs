//! Reports over procedure records: daily series, rankings, totals and
//! CSV export.
//!
//! Rows are fetched once, joined to patient and procedure names, and
//! aggregated in memory.

pub mod aggregate;
pub mod csv_export;
pub mod rpc;

use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::costing::{list_procedures, ProcedureError};
use crate::db::repository::{catalog_item_names, patient_names};
use crate::db::DatabaseError;
use crate::models::enums::ReportMetric;
use crate::models::{PaymentAmounts, ProcedureFilter, ProcedureRecord};

pub use aggregate::*;
pub use csv_export::{to_csv_string, write_csv, CSV_HEADER};
pub use rpc::{HttpReportRpc, RemoteReport, ReportRpc, RpcError, RpcParams, REPORT_RPC_NAME};

/// Label for rows without a patient.
pub const UNKNOWN_PATIENT: &str = "Sin paciente";
/// Label for rows without a (known) procedure type.
pub const UNKNOWN_KIND: &str = "Sin tipo";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Procedure(#[from] ProcedureError),
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid report query: {0}")]
    InvalidQuery(String),
}

/// One procedure record, labelled for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub id: Uuid,
    pub date: String,
    pub patient: String,
    /// Procedure type (catalog item name).
    pub kind: String,
    pub payments: PaymentAmounts,
    /// Total income across payment methods.
    pub amount: Decimal,
    pub utility: Option<Decimal>,
}

/// Filters plus the metric to aggregate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub catalog_item_id: Option<Uuid>,
    #[serde(default)]
    pub metric: ReportMetric,
}

impl ReportQuery {
    /// Date bounds must be plain `YYYY-MM-DD` days.
    pub fn validate(&self) -> Result<(), ReportError> {
        for (name, value) in [("date_from", &self.date_from), ("date_to", &self.date_to)] {
            if let Some(day) = value {
                if day.len() != 10 || NaiveDate::parse_from_str(day, "%Y-%m-%d").is_err() {
                    return Err(ReportError::InvalidQuery(format!("{name} must be YYYY-MM-DD, got {day:?}")));
                }
            }
        }
        Ok(())
    }

    pub fn filter(&self) -> ProcedureFilter {
        ProcedureFilter {
            date_from: self.date_from.clone(),
            date_to: self.date_to.clone(),
            patient_id: self.patient_id,
            catalog_item_id: self.catalog_item_id,
            page: None,
        }
    }

    pub fn rpc_params(&self) -> RpcParams {
        RpcParams {
            date_from: self.date_from.clone(),
            date_to: self.date_to.clone(),
            metric: self.metric,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalsSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub metric: ReportMetric,
    pub totals: ReportTotals,
    pub by_day: Vec<DayBucket>,
    pub top_records: Vec<ReportRow>,
    pub top_patients: Vec<CategoryBucket>,
    pub by_kind: Vec<CategoryBucket>,
    pub source: TotalsSource,
}

/// Label records with patient and procedure names. Unknown ids get a
/// placeholder rather than dropping the row.
pub fn to_report_rows(
    records: Vec<ProcedureRecord>,
    patients: &HashMap<Uuid, String>,
    kinds: &HashMap<Uuid, String>,
) -> Vec<ReportRow> {
    records
        .into_iter()
        .map(|record| {
            let patient = record
                .patient_id
                .and_then(|id| patients.get(&id).cloned())
                .unwrap_or_else(|| UNKNOWN_PATIENT.to_string());
            let kind = record
                .catalog_item_id
                .and_then(|id| kinds.get(&id).cloned())
                .unwrap_or_else(|| UNKNOWN_KIND.to_string());
            ReportRow {
                id: record.id,
                amount: record.payments.income(),
                date: record.date,
                patient,
                kind,
                payments: record.payments,
                utility: record.utility,
            }
        })
        .collect()
}

/// Fetch matching records (backfilling utility) and label them.
pub fn load_report_rows(conn: &Connection, query: &ReportQuery) -> Result<Vec<ReportRow>, ReportError> {
    query.validate()?;
    let records = list_procedures(conn, &query.filter())?;
    let patients: HashMap<Uuid, String> = patient_names(conn)?.into_iter().collect();
    let kinds: HashMap<Uuid, String> = catalog_item_names(conn)?.into_iter().collect();
    Ok(to_report_rows(records, &patients, &kinds))
}

/// Aggregate rows locally.
pub fn build_report(rows: &[ReportRow], metric: ReportMetric) -> ReportSummary {
    ReportSummary {
        metric,
        totals: compute_totals(rows),
        by_day: group_by_day(rows, metric),
        top_records: top_n(rows, metric, TOP_N),
        top_patients: top_categories(rows, |r| r.patient.as_str(), metric, TOP_N),
        by_kind: sum_by_category(rows, |r| r.kind.as_str(), metric),
        source: TotalsSource::Local,
    }
}

/// Like `build_report`, but takes totals and the daily series from the
/// remote RPC when one is configured and answers. Rankings always come
/// from the local rows.
pub async fn build_report_with_rpc(
    rpc: Option<&dyn ReportRpc>,
    query: &ReportQuery,
    rows: &[ReportRow],
) -> ReportSummary {
    let mut summary = build_report(rows, query.metric);
    let Some(rpc) = rpc else {
        return summary;
    };

    match rpc.call(REPORT_RPC_NAME, &query.rpc_params()).await {
        Ok(remote) => {
            summary.totals = remote.totals;
            summary.by_day = remote.by_day;
            summary.source = TotalsSource::Remote;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Remote report aggregation failed, using local totals");
        }
    }
    summary
}
