//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `BIND_ADDR` - listen address (default: 0.0.0.0:8080)
//! - `NUMBERING_STATE_PATH` - JSON file holding the invoice-number counter;
//!   unset keeps the counter in memory
//! - `PAYMENT_TERMS_DAYS` - default days until an invoice is due (default: 30)
//! - `DUE_SOON_DAYS` - window for "due soon" reminders (default: 7)

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use invoicely_invoicing::DueDateConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub numbering_state_path: Option<PathBuf>,
    pub due_dates: DueDateConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            numbering_state_path: None,
            due_dates: DueDateConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("BIND_ADDR".to_string(), e.to_string()))?;

        let numbering_state_path = get("NUMBERING_STATE_PATH").map(PathBuf::from);

        let defaults = DueDateConfig::default();
        let due_dates = DueDateConfig {
            payment_terms_days: parse_days(&get, "PAYMENT_TERMS_DAYS", defaults.payment_terms_days)?,
            due_soon_days: parse_days(&get, "DUE_SOON_DAYS", defaults.due_soon_days)?,
        };
        due_dates.validate().map_err(|e| {
            let var = match e.field_name() {
                Some("due_soon_days") => "DUE_SOON_DAYS",
                _ => "PAYMENT_TERMS_DAYS",
            };
            ConfigError::InvalidEnvVar(var.to_string(), e.to_string())
        })?;

        Ok(Self {
            bind_addr,
            numbering_state_path,
            due_dates,
        })
    }
}

fn parse_days(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u32,
) -> Result<u32, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}
