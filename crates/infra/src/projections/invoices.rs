use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use invoicely_core::AggregateId;
use invoicely_events::EventEnvelope;
use invoicely_invoicing::{
    AGGREGATE_TYPE, Client, InvoiceContent, InvoiceEvent, InvoiceId, InvoiceStatus, LineItem,
    Totals,
};

use crate::read_model::KeyValueStore;

/// Queryable invoice document, one per live invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceReadModel {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub client: Client,
    pub line_items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stream revision; pass back as `expected_version` on update.
    pub version: u64,
}

impl InvoiceReadModel {
    fn apply_content(&mut self, content: InvoiceContent, totals: Totals) {
        self.invoice_number = content.invoice_number;
        self.client = content.client;
        self.line_items = content.line_items;
        self.date = content.date;
        self.due_date = content.due_date;
        self.notes = content.notes;
        self.subtotal = totals.subtotal;
        self.tax_rate = totals.tax_rate;
        self.tax_amount = totals.tax_amount;
        self.total = totals.total;
    }
}

#[derive(Debug, Error)]
pub enum InvoiceProjectionError {
    #[error("failed to deserialize invoice event: {0}")]
    Deserialize(String),
    #[error("event invoice_id does not match envelope aggregate_id")]
    AggregateMismatch,
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
    #[error("event for unknown invoice {0}")]
    UnknownInvoice(InvoiceId),
}

/// Builds [`InvoiceReadModel`]s from `invoicing.invoice` envelopes.
///
/// Redelivered envelopes (sequence number at or below the cursor) are ignored.
#[derive(Debug)]
pub struct InvoicesProjection<S>
where
    S: KeyValueStore<InvoiceId, InvoiceReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> InvoicesProjection<S>
where
    S: KeyValueStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => cursors.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn advance_cursor(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn get(&self, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(invoice_id)
    }

    pub fn list(&self) -> Vec<InvoiceReadModel> {
        self.store.list()
    }

    /// Live invoice carrying `number` (ASCII case-insensitive, trimmed).
    pub fn find_by_number(&self, number: &str) -> Option<InvoiceReadModel> {
        let number = number.trim();
        self.store
            .list()
            .into_iter()
            .find(|rm| rm.invoice_number.eq_ignore_ascii_case(number))
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), InvoiceProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let last = self.cursor(aggregate_id);

        if seq == 0 {
            return Err(InvoiceProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 {
            return Err(InvoiceProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| InvoiceProjectionError::Deserialize(e.to_string()))?;

        let invoice_id = match &ev {
            InvoiceEvent::InvoiceCreated(e) => e.invoice_id,
            InvoiceEvent::InvoiceUpdated(e) => e.invoice_id,
            InvoiceEvent::InvoiceStatusChanged(e) => e.invoice_id,
            InvoiceEvent::InvoiceDeleted(e) => e.invoice_id,
        };
        if invoice_id.0 != aggregate_id {
            return Err(InvoiceProjectionError::AggregateMismatch);
        }

        match ev {
            InvoiceEvent::InvoiceCreated(e) => {
                self.store.upsert(
                    e.invoice_id,
                    InvoiceReadModel {
                        id: e.invoice_id,
                        invoice_number: e.content.invoice_number,
                        client: e.content.client,
                        line_items: e.content.line_items,
                        subtotal: e.totals.subtotal,
                        tax_rate: e.totals.tax_rate,
                        tax_amount: e.totals.tax_amount,
                        total: e.totals.total,
                        date: e.content.date,
                        due_date: e.content.due_date,
                        status: e.status,
                        notes: e.content.notes,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                        version: seq,
                    },
                );
            }
            InvoiceEvent::InvoiceUpdated(e) => {
                let mut rm = self
                    .store
                    .get(&e.invoice_id)
                    .ok_or(InvoiceProjectionError::UnknownInvoice(e.invoice_id))?;
                rm.apply_content(e.content, e.totals);
                rm.updated_at = e.occurred_at;
                rm.version = seq;
                self.store.upsert(e.invoice_id, rm);
            }
            InvoiceEvent::InvoiceStatusChanged(e) => {
                let mut rm = self
                    .store
                    .get(&e.invoice_id)
                    .ok_or(InvoiceProjectionError::UnknownInvoice(e.invoice_id))?;
                rm.status = e.to;
                rm.updated_at = e.occurred_at;
                rm.version = seq;
                self.store.upsert(e.invoice_id, rm);
            }
            InvoiceEvent::InvoiceDeleted(e) => {
                self.store.remove(&e.invoice_id);
            }
        }

        self.advance_cursor(aggregate_id, seq);
        Ok(())
    }

    /// Drop all state and replay `envelopes` in stream order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), InvoiceProjectionError> {
        self.store.clear();
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (e.aggregate_id(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
