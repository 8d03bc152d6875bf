//! Downloads: listing export, single invoice PDF and bulk PDF zip.

use std::sync::Arc;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Extension, Path, Query},
    http::{header, HeaderName},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use invoicely_core::DomainError;
use invoicely_export::{
    export_filename, invoices_to_csv, invoices_to_json, pdf_filename, render_invoice_pdf,
    ExportFormat,
};

use crate::app::dto::BulkPdfRequest;
use crate::app::errors::ApiError;
use crate::app::query::{InvoiceQuery, ListParams};
use crate::app::routes::{json_body, query_params};
use crate::app::services::{self, AppServices};

pub const MAX_BULK_IDS: usize = 500;

pub const BULK_ARCHIVED_HEADER: &str = "x-bulk-archived";
pub const BULK_FAILED_HEADER: &str = "x-bulk-failed";

pub fn router() -> Router {
    Router::new()
        .route("/export", get(export_invoices))
        .route("/pdf/bulk", post(bulk_pdf))
        .route("/:id/pdf", get(invoice_pdf))
}

fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}

/// Whole filtered listing (no pagination) as CSV or JSON.
pub async fn export_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let params = query_params(params)?;
    let format = match params.format.as_deref() {
        None => ExportFormat::Csv,
        Some(raw) => raw
            .parse::<ExportFormat>()
            .map_err(|msg| ApiError::invalid_query("format", msg))?,
    };
    let query = InvoiceQuery::parse(&params)?;
    let tracker = services.due_tracker()?;
    let today = services::today();
    let invoices = query.select(services.list_invoices(), &tracker, today);

    let body = match format {
        ExportFormat::Csv => invoices_to_csv(&invoices),
        ExportFormat::Json => invoices_to_json(&invoices)?,
    };
    tracing::info!(format = format.extension(), count = invoices.len(), "invoices exported");

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, attachment(&export_filename(format, today))),
        ],
        body,
    ))
}

pub async fn invoice_pdf(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = services.get_invoice(&id)?;
    let pdf = render_invoice_pdf(&invoice)?;
    let filename = pdf_filename(&invoice.invoice_number, invoice.id);

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&filename)),
        ],
        pdf,
    ))
}

/// Zip of PDFs. Invoices that cannot be found or rendered are skipped; the
/// counts are reported in `x-bulk-archived` / `x-bulk-failed`.
pub async fn bulk_pdf(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<BulkPdfRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(payload)?;
    if req.ids.is_empty() {
        return Err(DomainError::field("ids", "select at least one invoice").into());
    }
    if req.ids.len() > MAX_BULK_IDS {
        return Err(
            DomainError::field("ids", format!("at most {MAX_BULK_IDS} invoices per download")).into(),
        );
    }

    let archive = services.bulk_pdf(&req.ids)?;
    if !archive.report.failed.is_empty() {
        tracing::warn!(
            failed = archive.report.failed.len(),
            first_reason = %archive.report.failed[0].reason,
            "bulk pdf download skipped invoices"
        );
    }
    let filename = format!("invoices-{}.zip", services::today().format("%Y-%m-%d"));

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&filename)),
            (HeaderName::from_static(BULK_ARCHIVED_HEADER), archive.report.archived.len().to_string()),
            (HeaderName::from_static(BULK_FAILED_HEADER), archive.report.failed.len().to_string()),
        ],
        archive.bytes,
    ))
}
