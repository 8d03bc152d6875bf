use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use invoicely_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, ExpectedVersion};
use invoicely_events::Event;

use crate::client::Client;
use crate::line_item::{normalize_line_items, LineItem, Totals};
use crate::validation;

/// Stream type of invoice events in the event store.
pub const AGGREGATE_TYPE: &str = "invoicing.invoice";

/// Invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for InvoiceId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<AggregateId>().map(Self)
    }
}

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    /// Allowed lifecycle moves. `paid` is terminal and nothing returns to `draft`.
    ///
    /// `overdue -> sent` additionally needs a due date that is no longer past,
    /// which `Invoice` checks against the command date.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Sent) | (Draft, Paid) | (Sent, Paid) | (Sent, Overdue) | (Overdue, Paid) | (Overdue, Sent)
        )
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            _ => Err(DomainError::field(
                "status",
                "must be one of: draft, sent, paid, overdue",
            )),
        }
    }
}

/// The user-editable part of an invoice (everything except id, status and
/// derived totals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceContent {
    pub invoice_number: String,
    pub client: Client,
    pub line_items: Vec<LineItem>,
    pub tax_rate: rust_decimal::Decimal,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl InvoiceContent {
    /// Validate every field and return a normalized copy with its totals.
    ///
    /// Field errors carry the full path (`client.email`, `line_items[0].quantity`).
    pub fn prepare(self) -> DomainResult<(InvoiceContent, Totals)> {
        let invoice_number = self.invoice_number.trim().to_string();
        validation::validate_invoice_number(&invoice_number)?;

        let client = self.client.normalized();
        client.validate().map_err(|e| e.nested("client"))?;

        let line_items = normalize_line_items(self.line_items)?;
        let totals = Totals::compute(&line_items, self.tax_rate)?;

        validation::validate_dates(self.date, self.due_date)?;

        let notes = validation::normalize_optional(self.notes);
        validation::validate_notes(notes.as_deref())?;

        Ok((
            InvoiceContent {
                invoice_number,
                client,
                line_items,
                tax_rate: self.tax_rate,
                date: self.date,
                due_date: self.due_date,
                notes,
            },
            totals,
        ))
    }
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    content: Option<InvoiceContent>,
    totals: Totals,
    status: InvoiceStatus,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    deleted: bool,
}

impl Invoice {
    /// Not-yet-created instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            content: None,
            totals: Totals::zero(),
            status: InvoiceStatus::Draft,
            created_at: None,
            updated_at: None,
            version: 0,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn content(&self) -> Option<&InvoiceContent> {
        self.content.as_ref()
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn exists(&self) -> bool {
        self.content.is_some() && !self.deleted
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub invoice_id: InvoiceId,
    pub content: InvoiceContent,
    /// Initial status; `overdue` is only ever reached through a transition.
    pub status: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateInvoice (replaces all editable fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInvoice {
    pub invoice_id: InvoiceId,
    pub content: InvoiceContent,
    pub expected_version: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
    /// Calendar date the due date is compared against.
    pub today: NaiveDate,
    pub expected_version: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteInvoice {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    CreateInvoice(CreateInvoice),
    UpdateInvoice(UpdateInvoice),
    ChangeStatus(ChangeStatus),
    DeleteInvoice(DeleteInvoice),
}

/// Event: InvoiceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub content: InvoiceContent,
    pub totals: Totals,
    pub status: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceUpdated {
    pub invoice_id: InvoiceId,
    pub content: InvoiceContent,
    pub totals: Totals,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceStatusChanged {
    pub invoice_id: InvoiceId,
    pub from: InvoiceStatus,
    pub to: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDeleted {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceCreated(InvoiceCreated),
    InvoiceUpdated(InvoiceUpdated),
    InvoiceStatusChanged(InvoiceStatusChanged),
    InvoiceDeleted(InvoiceDeleted),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceCreated(_) => "invoicing.invoice.created",
            InvoiceEvent::InvoiceUpdated(_) => "invoicing.invoice.updated",
            InvoiceEvent::InvoiceStatusChanged(_) => "invoicing.invoice.status_changed",
            InvoiceEvent::InvoiceDeleted(_) => "invoicing.invoice.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.occurred_at,
            InvoiceEvent::InvoiceUpdated(e) => e.occurred_at,
            InvoiceEvent::InvoiceStatusChanged(e) => e.occurred_at,
            InvoiceEvent::InvoiceDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceCreated(e) => {
                self.id = e.invoice_id;
                self.content = Some(e.content.clone());
                self.totals = e.totals;
                self.status = e.status;
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.deleted = false;
            }
            InvoiceEvent::InvoiceUpdated(e) => {
                self.content = Some(e.content.clone());
                self.totals = e.totals;
                self.updated_at = Some(e.occurred_at);
            }
            InvoiceEvent::InvoiceStatusChanged(e) => {
                self.status = e.to;
                self.updated_at = Some(e.occurred_at);
            }
            InvoiceEvent::InvoiceDeleted(e) => {
                self.deleted = true;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::CreateInvoice(cmd) => self.handle_create(cmd),
            InvoiceCommand::UpdateInvoice(cmd) => self.handle_update(cmd),
            InvoiceCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            InvoiceCommand::DeleteInvoice(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Invoice {
    fn ensure_target(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found());
        }
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.content.is_some() {
            return Err(DomainError::conflict("invoice already exists"));
        }
        if cmd.status == InvoiceStatus::Overdue {
            return Err(DomainError::field(
                "status",
                "a new invoice cannot start as overdue",
            ));
        }

        let (content, totals) = cmd.content.clone().prepare()?;

        Ok(vec![InvoiceEvent::InvoiceCreated(InvoiceCreated {
            invoice_id: cmd.invoice_id,
            content,
            totals,
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_target(cmd.invoice_id)?;
        ExpectedVersion::from_client(cmd.expected_version).check(self.version)?;

        if self.status == InvoiceStatus::Paid {
            return Err(DomainError::invariant("a paid invoice cannot be edited"));
        }

        let (content, totals) = cmd.content.clone().prepare()?;

        if self.status == InvoiceStatus::Overdue && content.due_date.is_none() {
            return Err(DomainError::field(
                "due_date",
                "an overdue invoice must keep a due date",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceUpdated(InvoiceUpdated {
            invoice_id: cmd.invoice_id,
            content,
            totals,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_target(cmd.invoice_id)?;
        ExpectedVersion::from_client(cmd.expected_version).check(self.version)?;

        if self.status == cmd.status {
            return Err(DomainError::conflict(format!(
                "invoice is already {}",
                cmd.status
            )));
        }
        if !self.status.can_transition_to(cmd.status) {
            return Err(DomainError::invariant(format!(
                "cannot change status from {} to {}",
                self.status, cmd.status
            )));
        }
        let due_date = self.content.as_ref().and_then(|c| c.due_date);
        if cmd.status == InvoiceStatus::Overdue && due_date.is_none() {
            return Err(DomainError::invariant(
                "an invoice without a due date cannot be overdue",
            ));
        }
        if self.status == InvoiceStatus::Overdue
            && cmd.status == InvoiceStatus::Sent
            && due_date.is_some_and(|due| due < cmd.today)
        {
            return Err(DomainError::invariant(
                "extend the due date before moving an overdue invoice back to sent",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceStatusChanged(InvoiceStatusChanged {
            invoice_id: cmd.invoice_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_target(cmd.invoice_id)?;

        Ok(vec![InvoiceEvent::InvoiceDeleted(InvoiceDeleted {
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
