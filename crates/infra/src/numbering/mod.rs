//! Persistence for the invoice-number counter and its configuration.
//!
//! The counter must survive restarts; everything else about invoices is held
//! in memory only.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use invoicely_core::DomainError;
use invoicely_invoicing::{InvoiceNumbering, NumberingConfig};

#[derive(Debug, Error)]
pub enum NumberingStoreError {
    #[error("numbering state io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("numbering state is not valid json: {0}")]
    Format(#[from] serde_json::Error),
    #[error("stored numbering config is invalid: {0}")]
    Invalid(DomainError),
    #[error("numbering store lock poisoned")]
    Poisoned,
}

pub trait NumberingStore: Send + Sync {
    /// `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<NumberingConfig>, NumberingStoreError>;

    fn save(&self, config: &NumberingConfig) -> Result<(), NumberingStoreError>;

    /// Saved state, or the default configuration on first start.
    fn load_numbering(&self) -> Result<InvoiceNumbering, NumberingStoreError> {
        let config = self.load()?.unwrap_or_default();
        InvoiceNumbering::new(config).map_err(NumberingStoreError::Invalid)
    }
}

impl<S> NumberingStore for Arc<S>
where
    S: NumberingStore + ?Sized,
{
    fn load(&self) -> Result<Option<NumberingConfig>, NumberingStoreError> {
        (**self).load()
    }

    fn save(&self, config: &NumberingConfig) -> Result<(), NumberingStoreError> {
        (**self).save(config)
    }
}

/// Keeps the state for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryNumberingStore {
    state: RwLock<Option<NumberingConfig>>,
}

impl InMemoryNumberingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NumberingStore for InMemoryNumberingStore {
    fn load(&self) -> Result<Option<NumberingConfig>, NumberingStoreError> {
        let state = self.state.read().map_err(|_| NumberingStoreError::Poisoned)?;
        Ok(state.clone())
    }

    fn save(&self, config: &NumberingConfig) -> Result<(), NumberingStoreError> {
        let mut state = self.state.write().map_err(|_| NumberingStoreError::Poisoned)?;
        *state = Some(config.clone());
        Ok(())
    }
}

/// JSON file on disk. Writes go to a sibling temp file that is then renamed
/// over the target, so a crash never leaves a half-written state file.
#[derive(Debug, Clone)]
pub struct FileNumberingStore {
    path: PathBuf,
}

impl FileNumberingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "numbering.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> NumberingStoreError {
        NumberingStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl NumberingStore for FileNumberingStore {
    fn load(&self) -> Result<Option<NumberingConfig>, NumberingStoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        let config: NumberingConfig = serde_json::from_slice(&raw)?;
        config.validate().map_err(NumberingStoreError::Invalid)?;
        Ok(Some(config))
    }

    fn save(&self, config: &NumberingConfig) -> Result<(), NumberingStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let body = serde_json::to_vec_pretty(config)?;
        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(|e| self.io_err(e))?;
            file.write_all(&body).map_err(|e| self.io_err(e))?;
            file.sync_all().map_err(|e| self.io_err(e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;

        tracing::debug!(path = %self.path.display(), next_number = config.next_number, "numbering state saved");
        Ok(())
    }
}
