//! In-memory aggregation over already-fetched report rows.
//!
//! Everything here is a single pass plus a sort; no SQL grouping.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::enums::{PaymentMethod, ReportMetric};
use crate::models::PaymentAmounts;

use super::ReportRow;

/// Size of ranking lists.
pub const TOP_N: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBucket {
    pub day: String,
    pub total: Decimal,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBucket {
    pub key: String,
    pub total: Decimal,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub income: Decimal,
    pub utility: Decimal,
    pub count: u32,
    /// Income split by payment method.
    pub payments: PaymentAmounts,
}

/// Day key of an ISO date or date-time: its first 10 characters, taken
/// verbatim. `"2025-01-05T23:00:00Z"` buckets under `"2025-01-05"`
/// whatever the time zone.
pub fn day_key(date: &str) -> &str {
    match date.char_indices().nth(10) {
        Some((end, _)) => &date[..end],
        None => date,
    }
}

/// Value of `metric` for one row. An unset utility counts as zero.
pub fn metric_value(row: &ReportRow, metric: ReportMetric) -> Decimal {
    match metric {
        ReportMetric::Amount => row.amount,
        ReportMetric::Utility => row.utility.unwrap_or(Decimal::ZERO),
    }
}

/// Sum `metric` per day, ascending by day. Sums saturate at the decimal range.
pub fn group_by_day(rows: &[ReportRow], metric: ReportMetric) -> Vec<DayBucket> {
    let mut days: BTreeMap<&str, (Decimal, u32)> = BTreeMap::new();
    for row in rows {
        let entry = days.entry(day_key(&row.date)).or_insert((Decimal::ZERO, 0));
        entry.0 = entry.0.saturating_add(metric_value(row, metric));
        entry.1 += 1;
    }
    days.into_iter()
        .map(|(day, (total, count))| DayBucket { day: day.to_string(), total, count })
        .collect()
}

/// The `n` rows with the highest `metric`. Ties keep input order.
pub fn top_n(rows: &[ReportRow], metric: ReportMetric, n: usize) -> Vec<ReportRow> {
    let mut ranked: Vec<&ReportRow> = rows.iter().collect();
    // sort_by is stable
    ranked.sort_by(|a, b| metric_value(b, metric).cmp(&metric_value(a, metric)));
    ranked.into_iter().take(n).cloned().collect()
}

/// Sum `metric` per category, in first-seen order.
pub fn sum_by_category<F>(rows: &[ReportRow], key: F, metric: ReportMetric) -> Vec<CategoryBucket>
where
    F: Fn(&ReportRow) -> &str,
{
    let mut buckets: Vec<CategoryBucket> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let k = key(row);
        let pos = match index.get(k) {
            Some(&pos) => pos,
            None => {
                index.insert(k.to_string(), buckets.len());
                buckets.push(CategoryBucket { key: k.to_string(), total: Decimal::ZERO, count: 0 });
                buckets.len() - 1
            }
        };
        buckets[pos].total = buckets[pos].total.saturating_add(metric_value(row, metric));
        buckets[pos].count += 1;
    }
    buckets
}

/// Category ranking: per-category sums, highest first, ties in
/// first-seen order, truncated to `n`.
pub fn top_categories<F>(rows: &[ReportRow], key: F, metric: ReportMetric, n: usize) -> Vec<CategoryBucket>
where
    F: Fn(&ReportRow) -> &str,
{
    let mut buckets = sum_by_category(rows, key, metric);
    buckets.sort_by(|a, b| b.total.cmp(&a.total));
    buckets.truncate(n);
    buckets
}

pub fn compute_totals(rows: &[ReportRow]) -> ReportTotals {
    let mut totals = ReportTotals::default();
    for row in rows {
        totals.income = totals.income.saturating_add(row.amount);
        totals.utility = totals.utility.saturating_add(row.utility.unwrap_or(Decimal::ZERO));
        totals.count += 1;
        for method in PaymentMethod::ALL {
            if let Some(amount) = row.payments.get(method) {
                let sum = totals.payments.get(method).unwrap_or(Decimal::ZERO).saturating_add(amount);
                totals.payments.set(method, Some(sum));
            }
        }
    }
    totals
}
