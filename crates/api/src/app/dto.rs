//! Request/response bodies and their mapping to domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use invoicely_infra::projections::InvoiceReadModel;
use invoicely_invoicing::{Client, DueState, LineItem};

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemRequest {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl From<LineItemRequest> for LineItem {
    /// `line_total` is always recomputed by the domain.
    fn from(value: LineItemRequest) -> Self {
        LineItem {
            description: value.description,
            quantity: value.quantity,
            unit_price: value.unit_price,
            line_total: Decimal::ZERO,
        }
    }
}

/// Body of `POST /invoices` and `PUT /invoices/:id`.
///
/// Omitted `invoice_number` is generated on create and kept on update;
/// omitted `date` is today; omitted `due_date` is date + payment terms.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceRequest {
    #[serde(default)]
    pub invoice_number: Option<String>,
    pub client: Client,
    pub line_items: Vec<LineItemRequest>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Create only; defaults to `draft`.
    #[serde(default)]
    pub status: Option<String>,
    /// Update only.
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkPdfRequest {
    pub ids: Vec<String>,
}

/// An invoice with its due-date classification as of today.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: InvoiceReadModel,
    pub due: DueState,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoicePage {
    pub items: Vec<InvoiceResponse>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DueReport {
    pub today: NaiveDate,
    pub overdue: Vec<InvoiceResponse>,
    pub due_soon: Vec<InvoiceResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    pub flagged: usize,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumberPreview {
    pub next: String,
}
