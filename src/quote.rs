//! Lab exam quoting: client price for a selection of exams plus the
//! home-visit surcharge.
//!
//! Prices in the exam catalog are free text. Parsing never fails: garbage
//! reads as zero so a badly typed price can't block a quote.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::QuoteConfig;
use crate::db::repository::find_active_catalog_item_by_name;
use crate::models::LabExam;

static NON_NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^0-9.]").expect("static pattern")
});

/// Parse a price such as `"S/ 1,234.50"` into a decimal.
///
/// Everything but digits and dots is dropped, so signs, currency prefixes
/// and thousands separators all disappear and the result is never
/// negative. Only the text before a second dot is read.
pub fn parse_price(raw: &str) -> Decimal {
    let cleaned = NON_NUMERIC.replace_all(raw, "");
    let number = match cleaned.match_indices('.').nth(1) {
        Some((second_dot, _)) => &cleaned[..second_dot],
        None => &cleaned[..],
    };
    let number = number.trim_end_matches('.');
    if number.is_empty() || number == "." {
        return Decimal::ZERO;
    }
    Decimal::from_str(number).unwrap_or(Decimal::ZERO)
}

/// One selected exam as shown on the quote screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteExam {
    pub code: String,
    pub name: String,
    pub price: String,
}

impl From<&LabExam> for QuoteExam {
    fn from(exam: &LabExam) -> Self {
        Self {
            code: exam.code.clone(),
            name: exam.name.clone(),
            price: exam.price.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteLine {
    pub code: String,
    pub name: String,
    pub original_price: Decimal,
    pub client_price: Decimal,
    /// `client_price + surcharge` for every line.
    ///
    /// Known quirk: each displayed line carries the full surcharge while
    /// `ExamQuote::final_total` charges it once. `final_total` is the
    /// amount billed.
    pub display_price: Decimal,
}

/// Client-facing quote. Recomputed from the selection, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamQuote {
    pub lines: Vec<QuoteLine>,
    pub original_price: Decimal,
    pub client_price: Decimal,
    pub total_markup: Decimal,
    pub per_item_surcharge: Decimal,
    pub home_visit_cost: Decimal,
    pub final_total: Decimal,
}

/// Build the quote for `exams` with a flat `surcharge`. Arithmetic
/// saturates at the decimal range so a quote is always produced.
pub fn compute_quote(exams: &[QuoteExam], surcharge: Decimal, config: &QuoteConfig) -> ExamQuote {
    let lines: Vec<QuoteLine> = exams
        .iter()
        .map(|exam| {
            let original_price = parse_price(&exam.price);
            let client_price = original_price.saturating_mul(config.markup_rate);
            QuoteLine {
                code: exam.code.clone(),
                name: exam.name.clone(),
                original_price,
                client_price,
                display_price: client_price.saturating_add(surcharge),
            }
        })
        .collect();

    let original_price = lines
        .iter()
        .fold(Decimal::ZERO, |acc, l| acc.saturating_add(l.original_price));
    let client_price = original_price.saturating_mul(config.markup_rate);
    let home_visit_cost = surcharge;

    ExamQuote {
        lines,
        original_price,
        client_price,
        total_markup: client_price.saturating_sub(original_price),
        per_item_surcharge: surcharge,
        home_visit_cost,
        final_total: client_price.saturating_add(home_visit_cost),
    }
}

/// Home-visit surcharge: base price of the active catalog item named
/// `config.surcharge_item_name`, or `config.fallback_surcharge` when the
/// item is missing or the lookup fails.
pub fn resolve_surcharge(conn: &Connection, config: &QuoteConfig) -> Decimal {
    match find_active_catalog_item_by_name(conn, &config.surcharge_item_name) {
        Ok(Some(item)) => item.base_price,
        Ok(None) => {
            tracing::warn!(
                item = %config.surcharge_item_name,
                fallback = %config.fallback_surcharge,
                "Surcharge catalog item not found, using fallback"
            );
            config.fallback_surcharge
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback = %config.fallback_surcharge,
                "Surcharge lookup failed, using fallback"
            );
            config.fallback_surcharge
        }
    }
}
