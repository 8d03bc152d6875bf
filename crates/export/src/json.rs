use invoicely_infra::projections::InvoiceReadModel;

use crate::error::ExportError;

/// Pretty-printed JSON array of invoice documents.
pub fn invoices_to_json(invoices: &[InvoiceReadModel]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(invoices)?)
}
