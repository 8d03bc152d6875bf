//! Read models built from the invoice event stream.
//!
//! Projections are rebuildable from the store and idempotent under redelivery.

pub mod bus;
pub mod invoices;

pub use bus::{ProjectingBus, ProjectingBusError};
pub use invoices::{InvoiceProjectionError, InvoiceReadModel, InvoicesProjection};
