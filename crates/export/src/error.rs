use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot render invoice {invoice_number}: {reason}")]
    Render {
        invoice_number: String,
        reason: String,
    },
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("zip archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("archive io error: {0}")]
    Io(#[from] std::io::Error),
    /// Every requested invoice failed; `failed` is how many were requested.
    #[error("no invoice could be archived ({failed} failed)")]
    NothingArchived { failed: usize },
}
