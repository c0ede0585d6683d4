//! Billing Domain Ports
//!
//! Repository interfaces the billing core needs from its data source.
//! The domain services depend only on these traits; adapters provide
//! PostgreSQL (infra_db) or in-memory (test_utils) implementations.
//!
//! Two families of operations matter beyond plain CRUD:
//!
//! - **Atomic conditional transitions** (`mark_paid`, `cancel`,
//!   `mark_overdue_batch`): the state precondition and the write are one
//!   operation at the store, so two concurrent callers cannot both
//!   succeed against the same invoice in incompatible ways. A failed
//!   precondition surfaces as `PortError::Conflict`.
//! - **Window existence checks** (`exists_for_client_in`,
//!   `exists_for_cost_item_in`): the application-level idempotency guards
//!   of the scheduler and materializer. These are read-then-write and not
//!   transactionally safe on their own; the storage layer carries a
//!   uniqueness backstop on the same keys.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use core_kernel::{
    BillingCycle, ClientId, DateRange, DomainPort, InstallmentId, InvoiceId, LedgerEntryId, OrgId,
    PaymentId, Period, PortError, RecurringExpenseId,
};

use crate::client::Client;
use crate::installment::Installment;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::ledger::{EntryType, LedgerEntry};
use crate::payment::{Payment, PaymentStatus};
use crate::recurring::RecurringExpenseDefinition;

/// Query parameters for finding invoices
#[derive(Debug, Clone, Default)]
pub struct InvoiceQuery {
    /// Filter by client
    pub client_id: Option<ClientId>,
    /// Filter by status
    pub status: Option<InvoiceStatus>,
    /// Only invoices due strictly before this date
    pub due_before: Option<NaiveDate>,
    /// Only invoices issued inside this window
    pub issued_in: Option<DateRange>,
    /// Limit results
    pub limit: Option<u32>,
    /// Offset for pagination
    pub offset: Option<u32>,
}

impl InvoiceQuery {
    /// Creates a query for one client's invoices
    pub fn by_client(client_id: ClientId) -> Self {
        Self {
            client_id: Some(client_id),
            ..Default::default()
        }
    }

    /// Restricts to a status
    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to an issue window
    pub fn issued_in(mut self, window: DateRange) -> Self {
        self.issued_in = Some(window);
        self
    }

    /// Adds pagination to the query
    pub fn paginate(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

/// Query parameters for finding payments
#[derive(Debug, Clone, Default)]
pub struct PaymentQuery {
    pub client_id: Option<ClientId>,
    pub invoice_id: Option<InvoiceId>,
    pub status: Option<PaymentStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PaymentQuery {
    pub fn by_invoice(invoice_id: InvoiceId) -> Self {
        Self {
            invoice_id: Some(invoice_id),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Query parameters for finding ledger entries
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    pub entry_type: Option<EntryType>,
    pub client_id: Option<ClientId>,
    pub invoice_id: Option<InvoiceId>,
    pub dated_in: Option<DateRange>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl LedgerQuery {
    pub fn by_type(entry_type: EntryType) -> Self {
        Self {
            entry_type: Some(entry_type),
            ..Default::default()
        }
    }

    pub fn dated_in(mut self, window: DateRange) -> Self {
        self.dated_in = Some(window);
        self
    }
}

/// Repository port for invoices
#[async_trait]
pub trait InvoiceRepository: DomainPort {
    async fn create(&self, invoice: &Invoice) -> Result<(), PortError>;

    async fn update(&self, invoice: &Invoice) -> Result<(), PortError>;

    async fn find_by_id(&self, org_id: OrgId, id: InvoiceId) -> Result<Invoice, PortError>;

    async fn find_by_org(
        &self,
        org_id: OrgId,
        query: InvoiceQuery,
    ) -> Result<Vec<Invoice>, PortError>;

    /// The scheduler's monthly idempotency guard: does any non-cancelled
    /// invoice for this client fall inside the window?
    async fn exists_for_client_in(
        &self,
        org_id: OrgId,
        client_id: ClientId,
        window: DateRange,
    ) -> Result<bool, PortError>;

    /// Atomically pays an open or overdue invoice
    ///
    /// The status precondition is part of the write; a settled or
    /// cancelled invoice yields `PortError::Conflict`. Returns the
    /// updated invoice.
    async fn mark_paid(
        &self,
        org_id: OrgId,
        id: InvoiceId,
        paid_at: DateTime<Utc>,
    ) -> Result<Invoice, PortError>;

    /// Atomically cancels an open or overdue invoice
    async fn cancel(&self, org_id: OrgId, id: InvoiceId) -> Result<Invoice, PortError>;

    /// Resolves the organisation an invoice belongs to
    ///
    /// Gateway events arrive without a tenant; the invoice link is the
    /// first resolution step.
    async fn org_of(&self, id: InvoiceId) -> Result<Option<OrgId>, PortError>;

    /// One bulk transition: every open invoice past due becomes overdue
    ///
    /// Single statement at the store, not a per-row round trip. Returns
    /// the number of rows affected.
    async fn mark_overdue_batch(&self, org_id: OrgId, now: DateTime<Utc>) -> Result<u64, PortError>;

    async fn soft_delete(&self, org_id: OrgId, id: InvoiceId) -> Result<(), PortError>;
}

/// Repository port for payments
#[async_trait]
pub trait PaymentRepository: DomainPort {
    async fn create(&self, payment: &Payment) -> Result<(), PortError>;

    async fn update(&self, payment: &Payment) -> Result<(), PortError>;

    async fn find_by_id(&self, org_id: OrgId, id: PaymentId) -> Result<Payment, PortError>;

    async fn find_by_org(
        &self,
        org_id: OrgId,
        query: PaymentQuery,
    ) -> Result<Vec<Payment>, PortError>;

    /// Payments whose payment date falls inside the period (reconciliation input)
    async fn find_in_period(&self, org_id: OrgId, period: Period)
        -> Result<Vec<Payment>, PortError>;

    async fn soft_delete(&self, org_id: OrgId, id: PaymentId) -> Result<(), PortError>;
}

/// Repository port for ledger entries
#[async_trait]
pub trait LedgerEntryRepository: DomainPort {
    async fn create(&self, entry: &LedgerEntry) -> Result<(), PortError>;

    async fn update(&self, entry: &LedgerEntry) -> Result<(), PortError>;

    async fn find_by_id(&self, org_id: OrgId, id: LedgerEntryId)
        -> Result<LedgerEntry, PortError>;

    async fn find_by_org(
        &self,
        org_id: OrgId,
        query: LedgerQuery,
    ) -> Result<Vec<LedgerEntry>, PortError>;

    /// Income entries dated inside the period (reconciliation input)
    async fn find_income_in_period(
        &self,
        org_id: OrgId,
        period: Period,
    ) -> Result<Vec<LedgerEntry>, PortError>;

    /// The materializer's idempotency guard: was this definition already
    /// materialized inside the window?
    async fn exists_for_cost_item_in(
        &self,
        org_id: OrgId,
        cost_item_id: RecurringExpenseId,
        window: DateRange,
    ) -> Result<bool, PortError>;

    async fn soft_delete(&self, org_id: OrgId, id: LedgerEntryId) -> Result<(), PortError>;
}

/// Repository port for installments
#[async_trait]
pub trait InstallmentRepository: DomainPort {
    async fn create(&self, installment: &Installment) -> Result<(), PortError>;

    /// Persists a whole plan in one call
    async fn create_batch(&self, installments: &[Installment]) -> Result<(), PortError>;

    async fn update(&self, installment: &Installment) -> Result<(), PortError>;

    async fn find_by_id(&self, id: InstallmentId) -> Result<Installment, PortError>;

    async fn find_by_client(&self, client_id: ClientId) -> Result<Vec<Installment>, PortError>;

    /// Installments of this client falling due inside the window
    async fn find_due_in(
        &self,
        client_id: ClientId,
        window: DateRange,
    ) -> Result<Vec<Installment>, PortError>;

    async fn soft_delete(&self, id: InstallmentId) -> Result<(), PortError>;
}

/// Repository port for recurring expense definitions
#[async_trait]
pub trait RecurringExpenseRepository: DomainPort {
    async fn create(&self, definition: &RecurringExpenseDefinition) -> Result<(), PortError>;

    async fn update(&self, definition: &RecurringExpenseDefinition) -> Result<(), PortError>;

    async fn find_by_id(
        &self,
        org_id: OrgId,
        id: RecurringExpenseId,
    ) -> Result<RecurringExpenseDefinition, PortError>;

    async fn find_by_org(&self, org_id: OrgId)
        -> Result<Vec<RecurringExpenseDefinition>, PortError>;

    /// Active definitions on the given cadence (materializer input)
    async fn find_active_by_cycle(
        &self,
        org_id: OrgId,
        cycle: BillingCycle,
    ) -> Result<Vec<RecurringExpenseDefinition>, PortError>;

    async fn soft_delete(&self, org_id: OrgId, id: RecurringExpenseId) -> Result<(), PortError>;
}

/// Repository port for the billing view of clients
#[async_trait]
pub trait ClientRepository: DomainPort {
    async fn create(&self, client: &Client) -> Result<(), PortError>;

    async fn update(&self, client: &Client) -> Result<(), PortError>;

    async fn find_by_id(&self, org_id: OrgId, id: ClientId) -> Result<Client, PortError>;

    /// Active clients eligible for billing runs
    async fn find_active_by_org(&self, org_id: OrgId) -> Result<Vec<Client>, PortError>;

    /// Resolves the organisation a client belongs to (gateway resolution)
    async fn org_of(&self, client_id: ClientId) -> Result<Option<OrgId>, PortError>;

    /// Top-level input validation for batch runs
    async fn org_exists(&self, org_id: OrgId) -> Result<bool, PortError>;

    /// The documented single-tenant fallback: the first organisation on
    /// record, for gateway events that resolve to no tenant
    async fn first_org(&self) -> Result<Option<OrgId>, PortError>;

    async fn soft_delete(&self, org_id: OrgId, id: ClientId) -> Result<(), PortError>;
}
