//! Conversions between domain values and their SQLite column encodings.
//!
//! Money is stored as TEXT so no precision is lost in the round trip.

use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use super::DatabaseError;

pub fn decimal_to_sql(value: &Decimal) -> String {
    value.normalize().to_string()
}

pub fn opt_decimal_to_sql(value: &Option<Decimal>) -> Option<String> {
    value.as_ref().map(decimal_to_sql)
}

/// Parse a required money column.
pub fn decimal_from_sql(column: &str, raw: &str) -> Result<Decimal, DatabaseError> {
    Decimal::from_str(raw.trim()).map_err(|_| DatabaseError::InvalidDecimal {
        column: column.into(),
        value: raw.into(),
    })
}

/// Parse a nullable money column. Empty strings read as NULL.
pub fn opt_decimal_from_sql(
    column: &str,
    raw: Option<String>,
) -> Result<Option<Decimal>, DatabaseError> {
    match raw {
        Some(s) if !s.trim().is_empty() => decimal_from_sql(column, &s).map(Some),
        _ => Ok(None),
    }
}

pub fn uuid_from_sql(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
