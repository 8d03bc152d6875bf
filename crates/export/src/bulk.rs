//! Many invoice PDFs bundled into one zip download.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use invoicely_infra::projections::InvoiceReadModel;
use invoicely_invoicing::InvoiceId;

use crate::error::ExportError;
use crate::filename::sanitize_file_stem;
use crate::pdf::render_invoice_pdf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    /// The id as requested; may not be a valid invoice id.
    pub id: String,
    pub reason: String,
}

/// Outcome of a bulk run: what went into the archive and what was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BulkReport {
    /// File names written, in request order.
    pub archived: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

#[derive(Debug)]
pub struct BulkArchive {
    pub bytes: Vec<u8>,
    pub report: BulkReport,
}

/// `<stem>.pdf`, or `<stem>-2.pdf`, `<stem>-3.pdf`, ... when taken.
fn unique_name(stem: &str, used: &mut HashSet<String>) -> String {
    let mut name = format!("{stem}.pdf");
    let mut n = 2u32;
    while used.contains(&name.to_ascii_lowercase()) {
        name = format!("{stem}-{n}.pdf");
        n += 1;
    }
    used.insert(name.to_ascii_lowercase());
    name
}

/// Render each requested invoice in turn into one zip archive.
///
/// Ids that `lookup` cannot resolve and invoices that fail to render are
/// skipped and listed in the report. Repeated ids are archived once. It is an
/// error only when nothing could be archived.
pub fn bulk_pdf_archive<F>(ids: &[InvoiceId], lookup: F) -> Result<BulkArchive, ExportError>
where
    F: Fn(&InvoiceId) -> Option<InvoiceReadModel>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut report = BulkReport::default();
    let mut seen = HashSet::new();
    let mut used_names = HashSet::new();

    for id in ids {
        if !seen.insert(*id) {
            continue;
        }

        let Some(invoice) = lookup(id) else {
            report.failed.push(BulkFailure {
                id: id.to_string(),
                reason: "invoice not found".to_string(),
            });
            continue;
        };

        let pdf = match render_invoice_pdf(&invoice) {
            Ok(pdf) => pdf,
            Err(e) => {
                tracing::warn!(invoice_id = %id, error = %e, "skipping invoice in bulk download");
                report.failed.push(BulkFailure {
                    id: id.to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let name = unique_name(&sanitize_file_stem(&invoice.invoice_number), &mut used_names);
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&pdf)?;
        report.archived.push(name);
    }

    if report.archived.is_empty() {
        return Err(ExportError::NothingArchived {
            failed: report.failed.len(),
        });
    }

    let bytes = zip.finish()?.into_inner();
    tracing::info!(
        archived = report.archived.len(),
        failed = report.failed.len(),
        bytes = bytes.len(),
        "bulk pdf archive built"
    );
    Ok(BulkArchive { bytes, report })
}
