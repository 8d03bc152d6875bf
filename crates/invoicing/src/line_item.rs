use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use invoicely_core::{DomainError, DomainResult};

use crate::validation::{self, MAX_DESCRIPTION_LEN};

/// Upper bounds keep every product and sum far away from `Decimal` overflow.
const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);
const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Round a money amount to cents, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A billable row on an invoice.
///
/// `line_total` is always derived; a value supplied by a client is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub line_total: Decimal,
}

impl LineItem {
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> DomainResult<Self> {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            line_total: Decimal::ZERO,
        }
        .recomputed()
    }

    /// Validate, trim the description and recompute `line_total`.
    pub fn recomputed(self) -> DomainResult<Self> {
        self.validate()?;
        let line_total = self
            .quantity
            .checked_mul(self.unit_price)
            .map(round_money)
            .ok_or_else(|| DomainError::field("line_total", "amount overflow"))?;
        Ok(Self {
            description: self.description.trim().to_string(),
            line_total,
            ..self
        })
    }

    pub fn validate(&self) -> DomainResult<()> {
        validation::require_text("description", &self.description, MAX_DESCRIPTION_LEN)?;
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::field("quantity", "must be greater than 0"));
        }
        if self.quantity > MAX_QUANTITY {
            return Err(DomainError::field("quantity", "is too large"));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(DomainError::field("unit_price", "must not be negative"));
        }
        if self.unit_price > MAX_UNIT_PRICE {
            return Err(DomainError::field("unit_price", "is too large"));
        }
        Ok(())
    }
}

/// Validate and recompute a whole item list, nesting field paths as
/// `line_items[i].field`.
pub fn normalize_line_items(items: Vec<LineItem>) -> DomainResult<Vec<LineItem>> {
    if items.is_empty() {
        return Err(DomainError::field(
            "line_items",
            "at least one line item is required",
        ));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            item.recomputed()
                .map_err(|e| e.nested(&format!("line_items[{idx}]")))
        })
        .collect()
}

/// Derived invoice amounts.
///
/// `subtotal = Σ line_total`, `tax_amount = round(subtotal × tax_rate / 100)`,
/// `total = subtotal + tax_amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl Totals {
    pub fn compute(items: &[LineItem], tax_rate: Decimal) -> DomainResult<Self> {
        validation::validate_tax_rate(tax_rate)?;

        let subtotal = items.iter().try_fold(Decimal::ZERO, |acc, item| {
            acc.checked_add(item.line_total)
                .ok_or_else(|| DomainError::invariant("invoice subtotal overflow"))
        })?;

        let tax_amount = subtotal
            .checked_mul(tax_rate)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .map(round_money)
            .ok_or_else(|| DomainError::invariant("tax amount overflow"))?;

        let total = subtotal
            .checked_add(tax_amount)
            .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;

        Ok(Self {
            subtotal,
            tax_rate,
            tax_amount,
            total,
        })
    }

    pub fn zero() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }
}
