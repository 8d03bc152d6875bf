//! Field-level validation rules shared by the invoicing types.
//!
//! Every failure is reported as [`DomainError::InvalidField`] naming the field.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use invoicely_core::{DomainError, DomainResult};

pub const MAX_NOTES_LEN: usize = 2000;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_ADDRESS_LEN: usize = 1000;
pub const MAX_INVOICE_NUMBER_LEN: usize = 64;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9 +()\-.]{7,20}$").expect("valid phone regex"));

static INVOICE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._/-]+$").expect("valid invoice number regex"));

pub fn require_text(field: &str, value: &str, max_len: usize) -> DomainResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::field(field, "is required"));
    }
    if trimmed.chars().count() > max_len {
        return Err(DomainError::field(
            field,
            format!("must be at most {max_len} characters"),
        ));
    }
    Ok(())
}

pub fn validate_email(field: &str, value: &str) -> DomainResult<()> {
    require_text(field, value, 254)?;
    if !EMAIL_RE.is_match(value.trim()) {
        return Err(DomainError::field(field, "must be a valid email address"));
    }
    Ok(())
}

/// Phone numbers need 7 to 20 characters from `0-9 +()-.` and at least 7 digits.
pub fn validate_phone(field: &str, value: &str) -> DomainResult<()> {
    let value = value.trim();
    let digits = value.chars().filter(char::is_ascii_digit).count();
    if !PHONE_RE.is_match(value) || digits < 7 {
        return Err(DomainError::field(field, "must be a valid phone number"));
    }
    Ok(())
}

pub fn validate_tax_rate(tax_rate: Decimal) -> DomainResult<()> {
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
        return Err(DomainError::field("tax_rate", "must be between 0 and 100"));
    }
    Ok(())
}

pub fn validate_invoice_number(value: &str) -> DomainResult<()> {
    require_text("invoice_number", value, MAX_INVOICE_NUMBER_LEN)?;
    if !INVOICE_NUMBER_RE.is_match(value.trim()) {
        return Err(DomainError::field(
            "invoice_number",
            "may only contain letters, digits and . _ / -",
        ));
    }
    Ok(())
}

pub fn validate_dates(date: NaiveDate, due_date: Option<NaiveDate>) -> DomainResult<()> {
    if let Some(due) = due_date {
        if due < date {
            return Err(DomainError::field(
                "due_date",
                "must not be before the invoice date",
            ));
        }
    }
    Ok(())
}

pub fn validate_notes(notes: Option<&str>) -> DomainResult<()> {
    if let Some(notes) = notes {
        if notes.chars().count() > MAX_NOTES_LEN {
            return Err(DomainError::field(
                "notes",
                format!("must be at most {MAX_NOTES_LEN} characters"),
            ));
        }
    }
    Ok(())
}

/// Trim and collapse blank optional text to `None`.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: DomainError) -> String {
        err.field_name().unwrap_or_default().to_string()
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("email", "billing@acme.io").is_ok());
        assert!(validate_email("email", "  a@b.co  ").is_ok());
        assert_eq!(field_of(validate_email("email", "acme.io").unwrap_err()), "email");
        assert!(validate_email("email", "a@b").is_err());
        assert!(validate_email("email", "a b@c.de").is_err());
        assert!(validate_email("email", "").is_err());
    }

    #[test]
    fn phone_needs_seven_digits() {
        assert!(validate_phone("phone", "+1 (555) 010-2030").is_ok());
        assert!(validate_phone("phone", "555.0102").is_ok());
        assert!(validate_phone("phone", "(12) 3-4").is_err());
        assert!(validate_phone("phone", "call me maybe").is_err());
    }

    #[test]
    fn phone_length_and_charset_bounds() {
        let twenty = format!("+{}", "1".repeat(19));
        assert!(validate_phone("phone", &twenty).is_ok());
        let twenty_one = format!("+{}", "1".repeat(20));
        assert!(validate_phone("phone", &twenty_one).is_err());
        assert!(validate_phone("phone", "555/010/2030").is_err());
        assert!(validate_phone("phone", "555 0102 ext+1").is_err());
        assert!(validate_phone("phone", "0044 +20 7946 0958").is_ok());
    }

    #[test]
    fn tax_rate_is_a_percentage() {
        assert!(validate_tax_rate(Decimal::ZERO).is_ok());
        assert!(validate_tax_rate(Decimal::ONE_HUNDRED).is_ok());
        assert!(validate_tax_rate(Decimal::new(825, 2)).is_ok());
        assert_eq!(field_of(validate_tax_rate(Decimal::new(-1, 0)).unwrap_err()), "tax_rate");
        assert!(validate_tax_rate(Decimal::new(10001, 2)).is_err());
    }

    #[test]
    fn invoice_numbers_use_a_safe_charset() {
        assert!(validate_invoice_number("INV-2026-0001").is_ok());
        assert!(validate_invoice_number("2026/07.a_b").is_ok());
        assert!(validate_invoice_number("INV 1").is_err());
        assert!(validate_invoice_number("   ").is_err());
        assert!(validate_invoice_number(&"9".repeat(65)).is_err());
    }

    #[test]
    fn due_date_cannot_precede_invoice_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(validate_dates(date, None).is_ok());
        assert!(validate_dates(date, Some(date)).is_ok());
        let err = validate_dates(date, date.pred_opt()).unwrap_err();
        assert_eq!(field_of(err), "due_date");
    }

    #[test]
    fn blank_optional_text_becomes_none() {
        assert_eq!(normalize_optional(Some("  ".into())), None);
        assert_eq!(normalize_optional(Some(" hi ".into())), Some("hi".into()));
        assert_eq!(normalize_optional(None), None);
    }
}
