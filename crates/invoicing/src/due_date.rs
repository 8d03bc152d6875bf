//! Due-date tracking: default payment terms and overdue / due-soon classification.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use invoicely_core::{DomainError, DomainResult};

use crate::invoice::InvoiceStatus;

const MAX_PAYMENT_TERMS_DAYS: u32 = 365;
const MAX_DUE_SOON_DAYS: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DueDateConfig {
    /// Days between invoice date and the default due date ("net 30").
    pub payment_terms_days: u32,
    /// Window (in days, inclusive) in which an open invoice counts as due soon.
    pub due_soon_days: u32,
}

impl Default for DueDateConfig {
    fn default() -> Self {
        Self {
            payment_terms_days: 30,
            due_soon_days: 7,
        }
    }
}

impl DueDateConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.payment_terms_days > MAX_PAYMENT_TERMS_DAYS {
            return Err(DomainError::field(
                "payment_terms_days",
                format!("must be between 0 and {MAX_PAYMENT_TERMS_DAYS}"),
            ));
        }
        if self.due_soon_days > MAX_DUE_SOON_DAYS {
            return Err(DomainError::field(
                "due_soon_days",
                format!("must be between 0 and {MAX_DUE_SOON_DAYS}"),
            ));
        }
        Ok(())
    }
}

/// Where an invoice stands relative to its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DueState {
    /// Paid; nothing owed.
    Settled,
    /// Still a draft; not yet owed.
    NotIssued,
    NoDueDate,
    Overdue { days_overdue: i64 },
    DueSoon { days_left: i64 },
    Upcoming { days_left: i64 },
}

impl DueState {
    pub fn is_overdue(self) -> bool {
        matches!(self, DueState::Overdue { .. })
    }

    pub fn is_due_soon(self) -> bool {
        matches!(self, DueState::DueSoon { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DueDateTracker {
    config: DueDateConfig,
}

impl DueDateTracker {
    pub fn new(config: DueDateConfig) -> DomainResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> DueDateConfig {
        self.config
    }

    /// `date + payment_terms_days`, saturating at the calendar maximum.
    pub fn default_due_date(&self, date: NaiveDate) -> NaiveDate {
        date.checked_add_days(Days::new(u64::from(self.config.payment_terms_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn classify(
        &self,
        status: InvoiceStatus,
        due_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> DueState {
        match status {
            InvoiceStatus::Paid => return DueState::Settled,
            InvoiceStatus::Draft => return DueState::NotIssued,
            InvoiceStatus::Sent | InvoiceStatus::Overdue => {}
        }

        let Some(due) = due_date else {
            return DueState::NoDueDate;
        };

        let days_left = (due - today).num_days();
        if days_left < 0 {
            DueState::Overdue {
                days_overdue: -days_left,
            }
        } else if days_left <= i64::from(self.config.due_soon_days) {
            DueState::DueSoon { days_left }
        } else {
            DueState::Upcoming { days_left }
        }
    }

    /// A `sent` invoice past its due date that should be flagged `overdue`.
    pub fn needs_overdue_flag(
        &self,
        status: InvoiceStatus,
        due_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> bool {
        status == InvoiceStatus::Sent && self.classify(status, due_date, today).is_overdue()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn default_due_date_adds_payment_terms() {
        let tracker = DueDateTracker::default();
        assert_eq!(tracker.default_due_date(d(2026, 1, 15)), d(2026, 2, 14));

        let net0 = DueDateTracker::new(DueDateConfig {
            payment_terms_days: 0,
            ..DueDateConfig::default()
        })
        .unwrap();
        assert_eq!(net0.default_due_date(d(2026, 1, 15)), d(2026, 1, 15));
    }

    #[test]
    fn classification_by_calendar_distance() {
        let tracker = DueDateTracker::default();
        let today = d(2026, 10, 18);
        let sent = InvoiceStatus::Sent;

        assert_eq!(
            tracker.classify(sent, Some(d(2026, 10, 15)), today),
            DueState::Overdue { days_overdue: 3 }
        );
        assert_eq!(
            tracker.classify(sent, Some(today), today),
            DueState::DueSoon { days_left: 0 }
        );
        assert_eq!(
            tracker.classify(sent, Some(d(2026, 10, 25)), today),
            DueState::DueSoon { days_left: 7 }
        );
        assert_eq!(
            tracker.classify(sent, Some(d(2026, 10, 26)), today),
            DueState::Upcoming { days_left: 8 }
        );
        assert_eq!(tracker.classify(sent, None, today), DueState::NoDueDate);
    }

    #[test]
    fn paid_and_draft_are_never_overdue() {
        let tracker = DueDateTracker::default();
        let today = d(2026, 10, 18);
        let past = Some(d(2020, 1, 1));
        assert_eq!(tracker.classify(InvoiceStatus::Paid, past, today), DueState::Settled);
        assert_eq!(tracker.classify(InvoiceStatus::Draft, past, today), DueState::NotIssued);
        assert!(tracker.classify(InvoiceStatus::Overdue, past, today).is_overdue());
    }

    #[test]
    fn only_sent_invoices_need_flagging() {
        let tracker = DueDateTracker::default();
        let today = d(2026, 10, 18);
        let past = Some(d(2026, 10, 1));
        assert!(tracker.needs_overdue_flag(InvoiceStatus::Sent, past, today));
        assert!(!tracker.needs_overdue_flag(InvoiceStatus::Overdue, past, today));
        assert!(!tracker.needs_overdue_flag(InvoiceStatus::Sent, Some(today), today));
    }

    #[test]
    fn config_bounds() {
        let err = DueDateConfig {
            payment_terms_days: 366,
            ..DueDateConfig::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field_name(), Some("payment_terms_days"));

        let err = DueDateTracker::new(DueDateConfig {
            due_soon_days: 91,
            ..DueDateConfig::default()
        })
        .unwrap_err();
        assert_eq!(err.field_name(), Some("due_soon_days"));
    }

    #[test]
    fn due_state_serializes_with_a_tag() {
        let json = serde_json::to_value(DueState::Overdue { days_overdue: 4 }).unwrap();
        assert_eq!(json["state"], "overdue");
        assert_eq!(json["days_overdue"], 4);
        let json = serde_json::to_value(DueState::NoDueDate).unwrap();
        assert_eq!(json["state"], "no_due_date");
    }
}
