//! CSV export of report sets.

use std::io::{self, Write};

use crate::models::report::Report;

const BOM: &str = "\u{feff}";

pub const HEADERS: [&str; 8] = [
    "ID",
    "Título",
    "Descripción",
    "Estado",
    "Categoría",
    "Latitud",
    "Longitud",
    "Fecha",
];

/// Quotes a field when it contains a separator, quote or line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn row(fields: &[String]) -> String {
    fields.iter().map(|f| escape(f)).collect::<Vec<_>>().join(",")
}

fn coordinate(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Full CSV document, BOM-prefixed, one record per line.
pub fn reports_to_csv(reports: &[Report]) -> String {
    let mut out = String::from(BOM);
    out.push_str(&row(&HEADERS.map(String::from)));
    out.push('\n');
    for report in reports {
        let fields = [
            report.id.clone(),
            report.title.clone(),
            report.description.clone(),
            report.state.label().to_string(),
            report.category.display_name(),
            coordinate(report.lat),
            coordinate(report.lng),
            report.timestamp.clone(),
        ];
        out.push_str(&row(&fields));
        out.push('\n');
    }
    out
}

pub fn write_csv<W: Write>(mut writer: W, reports: &[Report]) -> io::Result<()> {
    writer.write_all(reports_to_csv(reports).as_bytes())?;
    writer.flush()
}

/// Default file name for an export made on `date`.
pub fn file_name(date: chrono::NaiveDate) -> String {
    format!("reportes_{}.csv", date.format("%Y-%m-%d"))
}
