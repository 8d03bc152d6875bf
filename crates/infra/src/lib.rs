//! Infrastructure layer: event store, command dispatch, read models and
//! numbering-state persistence.

pub mod command_dispatcher;
pub mod event_store;
pub mod numbering;
pub mod projections;
pub mod read_model;
