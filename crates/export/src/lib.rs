//! Invoice documents for download: CSV and JSON listings, per-invoice PDFs and
//! zip bundles of PDFs.

pub mod bulk;
pub mod csv;
pub mod error;
pub mod filename;
pub mod json;
pub mod pdf;

pub use bulk::{BulkArchive, BulkFailure, BulkReport, bulk_pdf_archive};
pub use csv::invoices_to_csv;
pub use error::ExportError;
pub use filename::{ExportFormat, export_filename, pdf_filename, sanitize_file_stem};
pub use json::invoices_to_json;
pub use pdf::render_invoice_pdf;
