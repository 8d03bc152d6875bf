//! Download file names and formats.

use chrono::NaiveDate;

use invoicely_invoicing::InvoiceId;

/// Listing export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

impl core::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unsupported export format '{other}' (expected csv or json)")),
        }
    }
}

/// File-system safe stem: ASCII letters, digits, `.`, `_` and `-`; anything
/// else becomes `_`. Never empty and never starts with a dot.
pub fn sanitize_file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "invoice".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `invoice-<number>.pdf`; falls back to the id when the number is blank.
pub fn pdf_filename(invoice_number: &str, id: InvoiceId) -> String {
    if invoice_number.trim().is_empty() {
        format!("invoice-{id}.pdf")
    } else {
        format!("invoice-{}.pdf", sanitize_file_stem(invoice_number))
    }
}

/// `invoices-<YYYY-MM-DD>.<ext>`.
pub fn export_filename(format: ExportFormat, today: NaiveDate) -> String {
    format!("invoices-{}.{}", today.format("%Y-%m-%d"), format.extension())
}
