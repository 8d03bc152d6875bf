//! Spreadsheet-friendly invoice listing.

use std::fmt::Write;

use rust_decimal::{Decimal, RoundingStrategy};

use invoicely_infra::projections::InvoiceReadModel;

pub const CSV_HEADER: &str =
    "Invoice Number,Date,Due Date,Status,Client,Email,Items,Subtotal,Tax Rate,Tax,Total,Notes";

/// Two fixed decimal places (`12.5` → `12.50`).
pub(crate) fn money(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// Leading `=`, `+`, `-` or `@` would be evaluated as a formula by spreadsheet
/// applications.
fn neutralize_formula(value: &str) -> String {
    match value.trim_start().chars().next() {
        Some('=' | '+' | '-' | '@') => format!("'{value}"),
        _ => value.to_string(),
    }
}

fn escape(value: &str) -> String {
    let safe = neutralize_formula(value);
    if safe.contains(',') || safe.contains('"') || safe.contains('\n') || safe.contains('\r') {
        format!("\"{}\"", safe.replace('"', "\"\""))
    } else {
        safe
    }
}

/// One row per invoice, in the given order, `\n` line endings.
pub fn invoices_to_csv(invoices: &[InvoiceReadModel]) -> String {
    let mut csv = String::with_capacity(CSV_HEADER.len() + 1 + invoices.len() * 128);
    csv.push_str(CSV_HEADER);
    csv.push('\n');

    for inv in invoices {
        let due = inv
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            escape(&inv.invoice_number),
            inv.date.format("%Y-%m-%d"),
            due,
            inv.status,
            escape(&inv.client.name),
            escape(&inv.client.email),
            inv.line_items.len(),
            money(inv.subtotal),
            inv.tax_rate.normalize(),
            money(inv.tax_amount),
            money(inv.total),
            escape(inv.notes.as_deref().unwrap_or("")),
        );
    }

    csv
}
