//! Invoicing domain module (event-sourced).
//!
//! Business rules for invoices, their clients and line items, invoice
//! numbering and due-date tracking, implemented as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod client;
pub mod due_date;
pub mod invoice;
pub mod line_item;
pub mod numbering;
pub mod validation;

pub use client::Client;
pub use due_date::{DueDateConfig, DueDateTracker, DueState};
pub use invoice::{
    ChangeStatus, CreateInvoice, DeleteInvoice, Invoice, InvoiceCommand, InvoiceContent,
    InvoiceCreated, InvoiceDeleted, InvoiceEvent, InvoiceId, InvoiceStatus, InvoiceStatusChanged,
    InvoiceUpdated, UpdateInvoice, AGGREGATE_TYPE,
};
pub use line_item::{LineItem, Totals, round_money};
pub use numbering::{InvoiceNumbering, NumberingConfig};
