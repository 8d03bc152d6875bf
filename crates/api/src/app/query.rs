//! List filtering, sorting and pagination over the invoices read model.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Deserialize;

use invoicely_infra::projections::InvoiceReadModel;
use invoicely_invoicing::{DueDateTracker, InvoiceStatus};

use crate::app::errors::ApiError;

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

/// Raw query string; everything is parsed by hand so that bad values can be
/// reported with the parameter name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub client: Option<String>,
    pub search: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub overdue: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
    /// Export only.
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Date,
    DueDate,
    Number,
    Client,
    Total,
    Status,
    CreatedAt,
}

impl SortKey {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "date" => SortKey::Date,
            "due_date" => SortKey::DueDate,
            "number" | "invoice_number" => SortKey::Number,
            "client" => SortKey::Client,
            "total" => SortKey::Total,
            "status" => SortKey::Status,
            "created_at" => SortKey::CreatedAt,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    /// Empty matches every status.
    pub statuses: Vec<InvoiceStatus>,
    pub client: Option<String>,
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub overdue: Option<bool>,
}

impl InvoiceFilter {
    pub fn matches(&self, rm: &InvoiceReadModel, tracker: &DueDateTracker, today: NaiveDate) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&rm.status) {
            return false;
        }
        if let Some(client) = &self.client {
            if !rm.client.name.to_lowercase().contains(client) {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            if !search_matches(rm, needle) {
                return false;
            }
        }
        if self.from.is_some_and(|from| rm.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| rm.date > to) {
            return false;
        }
        if let Some(wanted) = self.overdue {
            if tracker.classify(rm.status, rm.due_date, today).is_overdue() != wanted {
                return false;
            }
        }
        true
    }
}

/// `needle` is already lowercased.
fn search_matches(rm: &InvoiceReadModel, needle: &str) -> bool {
    let hit = |s: &str| s.to_lowercase().contains(needle);
    hit(&rm.invoice_number)
        || hit(&rm.client.name)
        || hit(&rm.client.email)
        || rm.notes.as_deref().is_some_and(hit)
        || rm.line_items.iter().any(|item| hit(&item.description))
}

#[derive(Debug, Clone)]
pub struct InvoiceQuery {
    pub filter: InvoiceFilter,
    pub sort: SortKey,
    pub order: SortOrder,
    pub page: usize,
    pub per_page: usize,
}

fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    raw.parse::<NaiveDate>()
        .map_err(|_| ApiError::invalid_query(field, "expected a date as YYYY-MM-DD"))
}

fn parse_positive(field: &str, raw: &str) -> Result<usize, ApiError> {
    raw.parse::<usize>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| ApiError::invalid_query(field, "expected a positive integer"))
}

impl InvoiceQuery {
    pub fn parse(params: &ListParams) -> Result<Self, ApiError> {
        let mut filter = InvoiceFilter::default();

        if let Some(raw) = non_empty(&params.status) {
            for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let status = part
                    .parse::<InvoiceStatus>()
                    .map_err(|e| ApiError::invalid_query("status", e.to_string()))?;
                if !filter.statuses.contains(&status) {
                    filter.statuses.push(status);
                }
            }
        }
        filter.client = non_empty(&params.client).map(str::to_lowercase);
        filter.search = non_empty(&params.search).map(str::to_lowercase);
        filter.from = non_empty(&params.from).map(|s| parse_date("from", s)).transpose()?;
        filter.to = non_empty(&params.to).map(|s| parse_date("to", s)).transpose()?;
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(ApiError::invalid_query("from", "must not be after 'to'"));
            }
        }
        filter.overdue = match non_empty(&params.overdue) {
            None => None,
            Some("true" | "1") => Some(true),
            Some("false" | "0") => Some(false),
            Some(_) => return Err(ApiError::invalid_query("overdue", "expected true or false")),
        };

        let sort = match non_empty(&params.sort) {
            None => SortKey::default(),
            Some(raw) => SortKey::parse(&raw.to_ascii_lowercase()).ok_or_else(|| {
                ApiError::invalid_query(
                    "sort",
                    "expected one of: date, due_date, number, client, total, status, created_at",
                )
            })?,
        };
        let order = match non_empty(&params.order).map(str::to_ascii_lowercase).as_deref() {
            None => SortOrder::default(),
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(_) => return Err(ApiError::invalid_query("order", "expected asc or desc")),
        };

        let page = non_empty(&params.page)
            .map(|s| parse_positive("page", s))
            .transpose()?
            .unwrap_or(1);
        let per_page = non_empty(&params.per_page)
            .map(|s| parse_positive("per_page", s))
            .transpose()?
            .unwrap_or(DEFAULT_PER_PAGE);
        if per_page > MAX_PER_PAGE {
            return Err(ApiError::invalid_query(
                "per_page",
                format!("must be at most {MAX_PER_PAGE}"),
            ));
        }

        Ok(Self {
            filter,
            sort,
            order,
            page,
            per_page,
        })
    }

    /// Filtered and sorted, unpaginated.
    pub fn select(
        &self,
        invoices: Vec<InvoiceReadModel>,
        tracker: &DueDateTracker,
        today: NaiveDate,
    ) -> Vec<InvoiceReadModel> {
        let mut selected: Vec<InvoiceReadModel> = invoices
            .into_iter()
            .filter(|rm| self.filter.matches(rm, tracker, today))
            .collect();
        selected.sort_by(|a, b| self.compare(a, b));
        selected
    }

    fn compare(&self, a: &InvoiceReadModel, b: &InvoiceReadModel) -> Ordering {
        let primary = match self.sort {
            SortKey::Date => a.date.cmp(&b.date),
            SortKey::DueDate => compare_missing_last(a.due_date, b.due_date),
            SortKey::Number => Ordering::Equal,
            SortKey::Client => a.client.name.to_lowercase().cmp(&b.client.name.to_lowercase()),
            SortKey::Total => a.total.cmp(&b.total),
            SortKey::Status => a.status.cmp(&b.status),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let primary = match (self.sort, self.order) {
            (SortKey::Number, SortOrder::Desc) => b.invoice_number.cmp(&a.invoice_number),
            (_, SortOrder::Desc) => primary.reverse(),
            _ => primary,
        };
        primary
            .then_with(|| a.invoice_number.cmp(&b.invoice_number))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// The requested page plus `(total, total_pages)`.
    pub fn paginate<T>(&self, items: Vec<T>) -> (Vec<T>, usize, usize) {
        let total = items.len();
        let total_pages = total.div_ceil(self.per_page);
        let start = (self.page - 1).saturating_mul(self.per_page);
        let page = items.into_iter().skip(start).take(self.per_page).collect();
        (page, total, total_pages)
    }
}

fn compare_missing_last(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use invoicely_invoicing::{Client, InvoiceId, LineItem};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn rm(number: &str, client: &str, date: NaiveDate, status: InvoiceStatus, total: i64) -> InvoiceReadModel {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        InvoiceReadModel {
            id: InvoiceId::generate(),
            invoice_number: number.into(),
            client: Client {
                name: client.into(),
                address: "addr".into(),
                email: format!("{}@example.com", client.to_lowercase()),
                phone: None,
            },
            line_items: vec![LineItem::new("Design work", Decimal::ONE, Decimal::new(total, 0)).unwrap()],
            subtotal: Decimal::new(total, 0),
            tax_rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total: Decimal::new(total, 0),
            date,
            due_date: date.checked_add_days(chrono::Days::new(30)),
            status,
            notes: None,
            created_at: at,
            updated_at: at,
            version: 1,
        }
    }

    fn sample() -> Vec<InvoiceReadModel> {
        vec![
            rm("INV-0001", "Acme", d(1, 10), InvoiceStatus::Paid, 100),
            rm("INV-0002", "Globex", d(2, 10), InvoiceStatus::Sent, 300),
            rm("INV-0003", "acme labs", d(3, 10), InvoiceStatus::Draft, 200),
            rm("INV-0004", "Initech", d(2, 10), InvoiceStatus::Sent, 50),
        ]
    }

    fn numbers(items: &[InvoiceReadModel]) -> Vec<&str> {
        items.iter().map(|r| r.invoice_number.as_str()).collect()
    }

    fn query(params: ListParams) -> InvoiceQuery {
        InvoiceQuery::parse(&params).unwrap()
    }

    fn run(params: ListParams) -> Vec<InvoiceReadModel> {
        query(params).select(sample(), &DueDateTracker::default(), d(3, 20))
    }

    #[test]
    fn defaults_sort_by_date_descending_with_number_tiebreak() {
        let q = query(ListParams::default());
        assert_eq!(q.page, 1);
        assert_eq!(q.per_page, DEFAULT_PER_PAGE);
        assert_eq!(
            numbers(&run(ListParams::default())),
            vec!["INV-0003", "INV-0002", "INV-0004", "INV-0001"]
        );
    }

    #[test]
    fn sort_keys_and_order() {
        let by_total = run(ListParams {
            sort: Some("total".into()),
            order: Some("asc".into()),
            ..Default::default()
        });
        assert_eq!(numbers(&by_total), vec!["INV-0004", "INV-0001", "INV-0003", "INV-0002"]);

        let by_number = run(ListParams {
            sort: Some("number".into()),
            ..Default::default()
        });
        assert_eq!(numbers(&by_number), vec!["INV-0004", "INV-0003", "INV-0002", "INV-0001"]);

        let by_client = run(ListParams {
            sort: Some("client".into()),
            order: Some("asc".into()),
            ..Default::default()
        });
        assert_eq!(numbers(&by_client), vec!["INV-0001", "INV-0003", "INV-0002", "INV-0004"]);
    }

    #[test]
    fn filters_combine() {
        let acme = run(ListParams {
            client: Some("ACME".into()),
            ..Default::default()
        });
        assert_eq!(numbers(&acme), vec!["INV-0003", "INV-0001"]);

        let sent_in_feb = run(ListParams {
            status: Some("sent".into()),
            from: Some("2026-02-01".into()),
            to: Some("2026-02-28".into()),
            ..Default::default()
        });
        assert_eq!(sent_in_feb.len(), 2);

        let several = run(ListParams {
            status: Some("draft, paid".into()),
            ..Default::default()
        });
        assert_eq!(numbers(&several), vec!["INV-0003", "INV-0001"]);

        let searched = run(ListParams {
            search: Some("globex@".into()),
            ..Default::default()
        });
        assert_eq!(numbers(&searched), vec!["INV-0002"]);
    }

    #[test]
    fn overdue_filter_uses_due_classification() {
        // Sent invoices dated Feb 10 fell due Mar 12; today is Mar 20.
        let overdue = run(ListParams {
            overdue: Some("true".into()),
            ..Default::default()
        });
        assert_eq!(numbers(&overdue), vec!["INV-0002", "INV-0004"]);
    }

    #[test]
    fn pagination() {
        let q = query(ListParams {
            page: Some("2".into()),
            per_page: Some("3".into()),
            ..Default::default()
        });
        let (items, total, pages) = q.paginate(vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(items, vec![4, 5, 6]);
        assert_eq!((total, pages), (7, 3));

        let beyond = query(ListParams {
            page: Some("9".into()),
            ..Default::default()
        });
        let (items, total, pages) = beyond.paginate(vec![1, 2]);
        assert!(items.is_empty());
        assert_eq!((total, pages), (2, 1));

        let (_, _, pages) = query(ListParams::default()).paginate(Vec::<u8>::new());
        assert_eq!(pages, 0);
    }

    #[test]
    fn bad_parameters_are_named() {
        let field = |params: ListParams| match InvoiceQuery::parse(&params) {
            Err(ApiError::InvalidQuery { field, .. }) => field,
            other => panic!("expected invalid query, got {other:?}"),
        };
        assert_eq!(field(ListParams { status: Some("void".into()), ..Default::default() }), "status");
        assert_eq!(field(ListParams { from: Some("01/02/2026".into()), ..Default::default() }), "from");
        assert_eq!(
            field(ListParams {
                from: Some("2026-03-01".into()),
                to: Some("2026-02-01".into()),
                ..Default::default()
            }),
            "from"
        );
        assert_eq!(field(ListParams { sort: Some("amount".into()), ..Default::default() }), "sort");
        assert_eq!(field(ListParams { order: Some("up".into()), ..Default::default() }), "order");
        assert_eq!(field(ListParams { page: Some("0".into()), ..Default::default() }), "page");
        assert_eq!(field(ListParams { per_page: Some("101".into()), ..Default::default() }), "per_page");
        assert_eq!(field(ListParams { overdue: Some("maybe".into()), ..Default::default() }), "overdue");
    }
}
