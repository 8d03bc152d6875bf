//! Bus decorator that keeps the invoices read model current on publish.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use invoicely_events::{EventBus, EventEnvelope, Subscription};
use invoicely_invoicing::InvoiceId;

use crate::projections::invoices::{InvoiceProjectionError, InvoiceReadModel, InvoicesProjection};
use crate::read_model::KeyValueStore;

#[derive(Debug, Error)]
pub enum ProjectingBusError {
    #[error(transparent)]
    Projection(#[from] InvoiceProjectionError),
    #[error("inner bus publish failed: {0}")]
    Inner(String),
}

/// Applies every envelope to the projection before fanning it out.
///
/// Subscribers of the inner bus still see every message; the projection is
/// simply updated first so a query issued after a command sees its effect.
#[derive(Debug)]
pub struct ProjectingBus<S, B>
where
    S: KeyValueStore<InvoiceId, InvoiceReadModel>,
{
    projection: Arc<InvoicesProjection<S>>,
    inner: B,
}

impl<S, B> ProjectingBus<S, B>
where
    S: KeyValueStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(projection: Arc<InvoicesProjection<S>>, inner: B) -> Self {
        Self { projection, inner }
    }
}

impl<S, B> EventBus<EventEnvelope<JsonValue>> for ProjectingBus<S, B>
where
    S: KeyValueStore<InvoiceId, InvoiceReadModel>,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    type Error = ProjectingBusError;

    fn publish(&self, message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
        if let Err(e) = self.projection.apply_envelope(&message) {
            tracing::warn!(
                aggregate_id = %message.aggregate_id(),
                sequence_number = message.sequence_number(),
                error = %e,
                "projection failed to apply envelope"
            );
            return Err(e.into());
        }

        self.inner
            .publish(message)
            .map_err(|e| ProjectingBusError::Inner(format!("{e:?}")))
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.inner.subscribe()
    }
}
