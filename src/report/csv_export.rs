use std::io::Write;

use csv::{QuoteStyle, WriterBuilder};
use rust_decimal::Decimal;

use crate::models::enums::PaymentMethod;

use super::ReportRow;

pub const CSV_HEADER: [&str; 9] = [
    "Fecha",
    "Paciente",
    "Tipo",
    "Yape",
    "Plin",
    "Transferencia",
    "Tarjeta",
    "Efectivo",
    "Utilidad",
];

fn money(value: Option<Decimal>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

/// Write report rows as CSV. Text fields are always quoted; amounts are
/// written with two decimals, missing ones as empty fields.
pub fn write_csv<W: Write>(rows: &[ReportRow], writer: W) -> Result<(), csv::Error> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(writer);

    wtr.write_record(CSV_HEADER)?;
    for row in rows {
        let mut record = vec![row.date.clone(), row.patient.clone(), row.kind.clone()];
        record.extend(PaymentMethod::ALL.iter().map(|m| money(row.payments.get(*m))));
        record.push(money(row.utility));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Same as `write_csv`, into a string.
pub fn to_csv_string(rows: &[ReportRow]) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
