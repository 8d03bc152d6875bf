//! Sequential, human-readable invoice numbers.
//!
//! The generator is pure: callers pass "today" for the optional year segment
//! and persist [`NumberingConfig`] themselves after [`InvoiceNumbering::next`].

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use invoicely_core::{DomainError, DomainResult};

const MAX_PREFIX_LEN: usize = 16;
const MAX_PADDING: u32 = 10;
const ALLOWED_SEPARATORS: [&str; 5] = ["", "-", "/", ".", "_"];

/// Numbering configuration plus the counter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub prefix: String,
    pub separator: String,
    pub include_year: bool,
    /// Minimum digit count; shorter numbers are zero-padded.
    pub padding: u32,
    /// The number the next invoice will receive.
    pub next_number: u64,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            prefix: "INV".to_string(),
            separator: "-".to_string(),
            include_year: false,
            padding: 4,
            next_number: 1,
        }
    }
}

impl NumberingConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.prefix.chars().count() > MAX_PREFIX_LEN
            || !self.prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(DomainError::field(
                "prefix",
                format!("must be at most {MAX_PREFIX_LEN} letters or digits"),
            ));
        }
        if !ALLOWED_SEPARATORS.contains(&self.separator.as_str()) {
            return Err(DomainError::field(
                "separator",
                "must be one of '-', '/', '.', '_' or empty",
            ));
        }
        if self.padding == 0 || self.padding > MAX_PADDING {
            return Err(DomainError::field(
                "padding",
                format!("must be between 1 and {MAX_PADDING}"),
            ));
        }
        if self.next_number == 0 {
            return Err(DomainError::field("next_number", "must be at least 1"));
        }
        Ok(())
    }

    /// Render `number` with this configuration.
    pub fn format(&self, number: u64, today: NaiveDate) -> String {
        let width = self.padding as usize;
        let mut out = String::with_capacity(self.prefix.len() + width + 8);
        if !self.prefix.is_empty() {
            out.push_str(&self.prefix);
            out.push_str(&self.separator);
        }
        if self.include_year {
            out.push_str(&today.year().to_string());
            out.push_str(&self.separator);
        }
        out.push_str(&format!("{number:0width$}"));
        out
    }
}

/// Counter that hands out invoice numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceNumbering {
    config: NumberingConfig,
}

impl InvoiceNumbering {
    pub fn new(config: NumberingConfig) -> DomainResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NumberingConfig {
        &self.config
    }

    /// Next number without consuming it.
    pub fn preview(&self, today: NaiveDate) -> String {
        self.config.format(self.config.next_number, today)
    }

    /// Consume and return the next number.
    pub fn next(&mut self, today: NaiveDate) -> DomainResult<String> {
        let number = self.config.next_number;
        let following = number
            .checked_add(1)
            .ok_or_else(|| DomainError::invariant("invoice number counter exhausted"))?;
        let formatted = self.config.format(number, today);
        self.config.next_number = following;
        Ok(formatted)
    }

    /// Replace the configuration (counter included).
    pub fn reconfigure(&mut self, config: NumberingConfig) -> DomainResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }
}
