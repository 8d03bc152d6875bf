//! Service wiring: event store, projecting bus, dispatcher, numbering and
//! due-date state, plus the invoice operations the routes call into.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;

use invoicely_core::DomainError;
use invoicely_events::{EventEnvelope, InMemoryEventBus};
use invoicely_export::{bulk_pdf_archive, BulkArchive, BulkFailure, ExportError};
use invoicely_infra::{
    command_dispatcher::CommandDispatcher,
    event_store::{InMemoryEventStore, StoredEvent},
    numbering::{FileNumberingStore, InMemoryNumberingStore, NumberingStore},
    projections::{InvoiceReadModel, InvoicesProjection, ProjectingBus},
    read_model::InMemoryStore,
};
use invoicely_invoicing::{
    ChangeStatus, CreateInvoice, DeleteInvoice, DueDateConfig, DueDateTracker, Invoice,
    InvoiceCommand, InvoiceContent, InvoiceId, InvoiceNumbering, InvoiceStatus, LineItem,
    NumberingConfig, UpdateInvoice, AGGREGATE_TYPE,
};

use crate::app::dto::{DueReport, InvoiceRequest, InvoiceResponse, SweepResponse};
use crate::app::errors::ApiError;
use crate::config::AppConfig;

/// Upper bound on numbers skipped while looking for a free one.
const MAX_NUMBER_ATTEMPTS: usize = 1000;

pub type InvoiceStore = Arc<InMemoryStore<InvoiceId, InvoiceReadModel>>;
pub type InvoiceBus = ProjectingBus<InvoiceStore, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;
pub type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, InvoiceBus>;

pub struct AppServices {
    dispatcher: Dispatcher,
    projection: Arc<InvoicesProjection<InvoiceStore>>,
    /// Held across create/update so number uniqueness checks and commits
    /// happen one at a time.
    numbering: Mutex<InvoiceNumbering>,
    numbering_store: Arc<dyn NumberingStore>,
    due_dates: RwLock<DueDateTracker>,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices").finish_non_exhaustive()
    }
}

/// Services for `config`: file-backed numbering when a state path is set,
/// in-memory otherwise.
pub fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let numbering_store: Arc<dyn NumberingStore> = match &config.numbering_state_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "numbering state persisted to file");
            Arc::new(FileNumberingStore::new(path.clone()))
        }
        None => {
            tracing::warn!("NUMBERING_STATE_PATH not set; invoice counter will reset on restart");
            Arc::new(InMemoryNumberingStore::new())
        }
    };
    AppServices::new(numbering_store, config.due_dates)
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn normalize_number(raw: Option<String>) -> Option<String> {
    raw.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

fn poisoned(what: &str) -> ApiError {
    ApiError::Internal(format!("{what} lock poisoned"))
}

impl AppServices {
    pub fn new(
        numbering_store: Arc<dyn NumberingStore>,
        due_dates: DueDateConfig,
    ) -> anyhow::Result<Self> {
        let numbering = numbering_store
            .load_numbering()
            .context("failed to load invoice numbering state")?;
        let tracker = DueDateTracker::new(due_dates).context("invalid due-date configuration")?;

        let projection = Arc::new(InvoicesProjection::new(Arc::new(InMemoryStore::new())));
        let bus = ProjectingBus::new(projection.clone(), Arc::new(InMemoryEventBus::new()));
        let dispatcher = CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), bus);

        tracing::info!(
            next_number = numbering.config().next_number,
            payment_terms_days = due_dates.payment_terms_days,
            "invoice services ready"
        );

        Ok(Self {
            dispatcher,
            projection,
            numbering: Mutex::new(numbering),
            numbering_store,
            due_dates: RwLock::new(tracker),
        })
    }

    fn lock_numbering(&self) -> Result<MutexGuard<'_, InvoiceNumbering>, ApiError> {
        self.numbering.lock().map_err(|_| poisoned("numbering"))
    }

    pub fn due_tracker(&self) -> Result<DueDateTracker, ApiError> {
        self.due_dates.read().map(|t| *t).map_err(|_| poisoned("due-date"))
    }

    fn dispatch(&self, invoice_id: InvoiceId, command: InvoiceCommand) -> Result<(), ApiError> {
        self.dispatcher.dispatch::<Invoice>(invoice_id.0, AGGREGATE_TYPE, command, |id| {
            Invoice::empty(InvoiceId::new(id))
        })?;
        Ok(())
    }

    fn reload(&self, invoice_id: &InvoiceId) -> Result<InvoiceReadModel, ApiError> {
        self.projection
            .get(invoice_id)
            .ok_or_else(|| ApiError::Internal(format!("invoice {invoice_id} missing from read model")))
    }

    fn ensure_number_free(&self, number: &str, owner: Option<InvoiceId>) -> Result<(), ApiError> {
        match self.projection.find_by_number(number) {
            Some(existing) if Some(existing.id) != owner => Err(ApiError::Conflict(format!(
                "invoice number {number} is already in use"
            ))),
            _ => Ok(()),
        }
    }

    /// Advance `numbering` until it yields a number no live invoice carries.
    fn next_free_number(
        &self,
        numbering: &mut InvoiceNumbering,
        today: NaiveDate,
    ) -> Result<String, ApiError> {
        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let candidate = numbering.next(today)?;
            if self.projection.find_by_number(&candidate).is_none() {
                return Ok(candidate);
            }
            tracing::debug!(number = %candidate, "generated invoice number taken, skipping");
        }
        Err(ApiError::Conflict(format!(
            "no free invoice number within {MAX_NUMBER_ATTEMPTS} attempts; adjust the numbering configuration"
        )))
    }

    pub fn create_invoice(&self, req: InvoiceRequest) -> Result<InvoiceReadModel, ApiError> {
        let today = today();
        let status = match req.status.as_deref() {
            Some(raw) => raw.parse::<InvoiceStatus>()?,
            None => InvoiceStatus::Draft,
        };
        let tracker = self.due_tracker()?;

        let mut numbering = self.lock_numbering()?;
        let mut advanced = numbering.clone();
        let invoice_number = match normalize_number(req.invoice_number) {
            Some(number) => {
                self.ensure_number_free(&number, None)?;
                number
            }
            None => self.next_free_number(&mut advanced, today)?,
        };

        let date = req.date.unwrap_or(today);
        let due_date = req.due_date.unwrap_or_else(|| tracker.default_due_date(date));
        let content = InvoiceContent {
            invoice_number,
            client: req.client,
            line_items: req.line_items.into_iter().map(LineItem::from).collect(),
            tax_rate: req.tax_rate,
            date,
            due_date: Some(due_date),
            notes: req.notes,
        };

        let invoice_id = InvoiceId::generate();
        self.dispatch(
            invoice_id,
            InvoiceCommand::CreateInvoice(CreateInvoice {
                invoice_id,
                content,
                status,
                occurred_at: Utc::now(),
            }),
        )?;

        // The counter only moves once the invoice exists.
        if advanced != *numbering {
            if let Err(e) = self.numbering_store.save(advanced.config()) {
                tracing::error!(error = %e, "failed to persist invoice counter");
            }
            *numbering = advanced;
        }
        drop(numbering);

        let created = self.reload(&invoice_id)?;
        tracing::info!(
            invoice_id = %invoice_id,
            invoice_number = %created.invoice_number,
            total = %created.total,
            "invoice created"
        );
        Ok(created)
    }

    /// Replace an invoice's content. Omitted number and date keep their
    /// current values; an omitted due date is recomputed from the date.
    pub fn update_invoice(&self, id: &str, req: InvoiceRequest) -> Result<InvoiceReadModel, ApiError> {
        let invoice_id = id.parse::<InvoiceId>()?;
        if req.status.is_some() {
            return Err(DomainError::field(
                "status",
                "change the status with POST /invoices/:id/status",
            )
            .into());
        }
        let tracker = self.due_tracker()?;

        let numbering = self.lock_numbering()?;
        let existing = self
            .projection
            .get(&invoice_id)
            .ok_or_else(ApiError::invoice_not_found)?;
        let invoice_number =
            normalize_number(req.invoice_number).unwrap_or_else(|| existing.invoice_number.clone());
        self.ensure_number_free(&invoice_number, Some(invoice_id))?;

        let date = req.date.unwrap_or(existing.date);
        let due_date = req.due_date.unwrap_or_else(|| tracker.default_due_date(date));
        let content = InvoiceContent {
            invoice_number,
            client: req.client,
            line_items: req.line_items.into_iter().map(LineItem::from).collect(),
            tax_rate: req.tax_rate,
            date,
            due_date: Some(due_date),
            notes: req.notes,
        };

        self.dispatch(
            invoice_id,
            InvoiceCommand::UpdateInvoice(UpdateInvoice {
                invoice_id,
                content,
                expected_version: req.expected_version,
                occurred_at: Utc::now(),
            }),
        )?;
        drop(numbering);

        tracing::info!(invoice_id = %invoice_id, "invoice updated");
        self.reload(&invoice_id)
    }

    pub fn change_status(&self, id: &str, status: &str) -> Result<InvoiceReadModel, ApiError> {
        let invoice_id = id.parse::<InvoiceId>()?;
        let status = status.parse::<InvoiceStatus>()?;
        self.dispatch(
            invoice_id,
            InvoiceCommand::ChangeStatus(ChangeStatus {
                invoice_id,
                status,
                today: today(),
                expected_version: None,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(invoice_id = %invoice_id, status = %status, "invoice status changed");
        self.reload(&invoice_id)
    }

    pub fn delete_invoice(&self, id: &str) -> Result<(), ApiError> {
        let invoice_id = id.parse::<InvoiceId>()?;
        self.dispatch(
            invoice_id,
            InvoiceCommand::DeleteInvoice(DeleteInvoice {
                invoice_id,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(invoice_id = %invoice_id, "invoice deleted");
        Ok(())
    }

    pub fn get_invoice(&self, id: &str) -> Result<InvoiceReadModel, ApiError> {
        let invoice_id = id.parse::<InvoiceId>()?;
        self.projection
            .get(&invoice_id)
            .ok_or_else(ApiError::invoice_not_found)
    }

    /// Every live invoice, unordered.
    pub fn list_invoices(&self) -> Vec<InvoiceReadModel> {
        self.projection.list()
    }

    /// Committed events of one invoice, deleted ones included.
    pub fn history(&self, id: &str) -> Result<Vec<StoredEvent>, ApiError> {
        let invoice_id = id.parse::<InvoiceId>()?;
        let events = self.dispatcher.history(invoice_id.0)?;
        if events.is_empty() {
            return Err(ApiError::invoice_not_found());
        }
        Ok(events)
    }

    pub fn to_response(
        &self,
        invoice: InvoiceReadModel,
        tracker: &DueDateTracker,
        today: NaiveDate,
    ) -> InvoiceResponse {
        let due = tracker.classify(invoice.status, invoice.due_date, today);
        InvoiceResponse { invoice, due }
    }

    pub fn respond(&self, invoice: InvoiceReadModel) -> Result<InvoiceResponse, ApiError> {
        let tracker = self.due_tracker()?;
        Ok(self.to_response(invoice, &tracker, today()))
    }

    /// Open invoices past due or due within the reminder window, soonest first.
    pub fn due_report(&self, today: NaiveDate) -> Result<DueReport, ApiError> {
        let tracker = self.due_tracker()?;
        let mut overdue = Vec::new();
        let mut due_soon = Vec::new();
        for invoice in self.projection.list() {
            let response = self.to_response(invoice, &tracker, today);
            if response.due.is_overdue() {
                overdue.push(response);
            } else if response.due.is_due_soon() {
                due_soon.push(response);
            }
        }
        let by_due = |a: &InvoiceResponse, b: &InvoiceResponse| {
            a.invoice
                .due_date
                .cmp(&b.invoice.due_date)
                .then_with(|| a.invoice.invoice_number.cmp(&b.invoice.invoice_number))
        };
        overdue.sort_by(by_due);
        due_soon.sort_by(by_due);
        Ok(DueReport {
            today,
            overdue,
            due_soon,
        })
    }

    /// Move every `sent` invoice past its due date to `overdue`.
    ///
    /// Each flag is guarded by the version the decision was made on, so an
    /// invoice edited in the meantime is skipped and re-examined next time.
    pub fn sweep_overdue(&self, today: NaiveDate) -> Result<SweepResponse, ApiError> {
        let tracker = self.due_tracker()?;
        let mut ids = Vec::new();
        for invoice in self.projection.list() {
            if !tracker.needs_overdue_flag(invoice.status, invoice.due_date, today) {
                continue;
            }
            let command = InvoiceCommand::ChangeStatus(ChangeStatus {
                invoice_id: invoice.id,
                status: InvoiceStatus::Overdue,
                today,
                expected_version: Some(invoice.version),
                occurred_at: Utc::now(),
            });
            match self.dispatch(invoice.id, command) {
                Ok(()) => ids.push(invoice.id.to_string()),
                Err(e) => tracing::warn!(invoice_id = %invoice.id, error = %e, "overdue sweep skipped invoice"),
            }
        }
        ids.sort();
        tracing::info!(flagged = ids.len(), %today, "overdue sweep finished");
        Ok(SweepResponse {
            flagged: ids.len(),
            ids,
        })
    }

    pub fn numbering_config(&self) -> Result<NumberingConfig, ApiError> {
        Ok(self.lock_numbering()?.config().clone())
    }

    /// The number the next generated invoice would get, collisions skipped.
    pub fn preview_number(&self, today: NaiveDate) -> Result<String, ApiError> {
        let mut numbering = self.lock_numbering()?.clone();
        self.next_free_number(&mut numbering, today)
    }

    /// Validate, persist, then swap in a new numbering configuration.
    pub fn update_numbering(&self, config: NumberingConfig) -> Result<NumberingConfig, ApiError> {
        let mut numbering = self.lock_numbering()?;
        let mut updated = numbering.clone();
        updated.reconfigure(config)?;
        self.numbering_store.save(updated.config())?;
        *numbering = updated;
        tracing::info!(next_number = numbering.config().next_number, "numbering reconfigured");
        Ok(numbering.config().clone())
    }

    pub fn due_date_config(&self) -> Result<DueDateConfig, ApiError> {
        Ok(self.due_tracker()?.config())
    }

    pub fn update_due_dates(&self, config: DueDateConfig) -> Result<DueDateConfig, ApiError> {
        let tracker = DueDateTracker::new(config)?;
        let mut current = self.due_dates.write().map_err(|_| poisoned("due-date"))?;
        *current = tracker;
        tracing::info!(
            payment_terms_days = config.payment_terms_days,
            due_soon_days = config.due_soon_days,
            "due-date settings updated"
        );
        Ok(config)
    }

    /// Zip of the requested invoices' PDFs. Ids that do not parse are
    /// reported as failures alongside missing ones.
    pub fn bulk_pdf(&self, ids: &[String]) -> Result<BulkArchive, ApiError> {
        let mut parsed = Vec::with_capacity(ids.len());
        let mut invalid = Vec::new();
        for raw in ids {
            match raw.parse::<InvoiceId>() {
                Ok(id) => parsed.push(id),
                Err(_) => invalid.push(BulkFailure {
                    id: raw.clone(),
                    reason: "invalid invoice id".to_string(),
                }),
            }
        }

        match bulk_pdf_archive(&parsed, |id| self.projection.get(id)) {
            Ok(mut archive) => {
                archive.report.failed.extend(invalid);
                Ok(archive)
            }
            Err(ExportError::NothingArchived { failed }) => Err(ExportError::NothingArchived {
                failed: failed + invalid.len(),
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }
}
