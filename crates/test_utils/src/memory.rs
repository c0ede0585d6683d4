//! In-memory repository adapters
//!
//! Mock implementations of every billing port, backed by mutex-guarded
//! maps. The conditional transitions reuse the entity lifecycle methods
//! under the lock, which mirrors the atomicity the PostgreSQL adapters
//! get from conditional UPDATEs.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{
    BillingCycle, ClientId, DateRange, DomainPort, InstallmentId, InvoiceId, LedgerEntryId, OrgId,
    PaymentId, Period, PortError, RecurringExpenseId,
};
use domain_billing::{
    Client, ClientRepository, Installment, InstallmentRepository, Invoice, InvoiceQuery,
    InvoiceRepository, InvoiceStatus, LedgerEntry, LedgerEntryRepository, LedgerQuery, Payment,
    PaymentQuery, PaymentRepository, RecurringExpenseDefinition, RecurringExpenseRepository,
};

fn conflict_from_invalid_state(err: domain_billing::BillingError) -> PortError {
    PortError::conflict(err.to_string())
}

// ============================================================================
// Invoices
// ============================================================================

/// In-memory invoice store
#[derive(Default)]
pub struct InMemoryInvoiceRepository {
    invoices: Mutex<HashMap<InvoiceId, Invoice>>,
    deleted: Mutex<HashSet<InvoiceId>>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored invoices, deleted included
    pub fn len(&self) -> usize {
        self.invoices.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DomainPort for InMemoryInvoiceRepository {}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn create(&self, invoice: &Invoice) -> Result<(), PortError> {
        let mut invoices = self.invoices.lock().unwrap();
        if invoices.contains_key(&invoice.id()) {
            return Err(PortError::conflict(format!(
                "Invoice {} already exists",
                invoice.id()
            )));
        }
        invoices.insert(invoice.id(), invoice.clone());
        Ok(())
    }

    async fn update(&self, invoice: &Invoice) -> Result<(), PortError> {
        let mut invoices = self.invoices.lock().unwrap();
        match invoices.get_mut(&invoice.id()) {
            Some(stored) => {
                *stored = invoice.clone();
                Ok(())
            }
            None => Err(PortError::not_found("Invoice", invoice.id())),
        }
    }

    async fn find_by_id(&self, org_id: OrgId, id: InvoiceId) -> Result<Invoice, PortError> {
        if self.deleted.lock().unwrap().contains(&id) {
            return Err(PortError::not_found("Invoice", id));
        }
        self.invoices
            .lock()
            .unwrap()
            .get(&id)
            .filter(|invoice| invoice.org_id() == org_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Invoice", id))
    }

    async fn find_by_org(
        &self,
        org_id: OrgId,
        query: InvoiceQuery,
    ) -> Result<Vec<Invoice>, PortError> {
        let deleted = self.deleted.lock().unwrap().clone();
        let mut results: Vec<Invoice> = self
            .invoices
            .lock()
            .unwrap()
            .values()
            .filter(|invoice| invoice.org_id() == org_id)
            .filter(|invoice| !deleted.contains(&invoice.id()))
            .filter(|invoice| {
                query
                    .client_id
                    .is_none_or(|client_id| invoice.client_id() == client_id)
            })
            .filter(|invoice| query.status.is_none_or(|status| invoice.status() == status))
            .filter(|invoice| {
                query
                    .due_before
                    .is_none_or(|cutoff| invoice.due_date() < cutoff)
            })
            .filter(|invoice| {
                query
                    .issued_in
                    .is_none_or(|window| window.contains(invoice.issue_date()))
            })
            .cloned()
            .collect();
        results.sort_by_key(|invoice| invoice.id());

        let offset = query.offset.unwrap_or(0) as usize;
        let results: Vec<Invoice> = results.into_iter().skip(offset).collect();
        match query.limit {
            Some(limit) => Ok(results.into_iter().take(limit as usize).collect()),
            None => Ok(results),
        }
    }

    async fn exists_for_client_in(
        &self,
        org_id: OrgId,
        client_id: ClientId,
        window: DateRange,
    ) -> Result<bool, PortError> {
        let deleted = self.deleted.lock().unwrap().clone();
        Ok(self.invoices.lock().unwrap().values().any(|invoice| {
            invoice.org_id() == org_id
                && invoice.client_id() == client_id
                && invoice.status() != InvoiceStatus::Cancelled
                && window.contains(invoice.issue_date())
                && !deleted.contains(&invoice.id())
        }))
    }

    async fn org_of(&self, id: InvoiceId) -> Result<Option<OrgId>, PortError> {
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .get(&id)
            .map(|invoice| invoice.org_id()))
    }

    async fn mark_paid(
        &self,
        org_id: OrgId,
        id: InvoiceId,
        paid_at: DateTime<Utc>,
    ) -> Result<Invoice, PortError> {
        let mut invoices = self.invoices.lock().unwrap();
        let invoice = invoices
            .get_mut(&id)
            .filter(|invoice| invoice.org_id() == org_id)
            .ok_or_else(|| PortError::not_found("Invoice", id))?;
        invoice
            .pay(Some(paid_at))
            .map_err(conflict_from_invalid_state)?;
        Ok(invoice.clone())
    }

    async fn cancel(&self, org_id: OrgId, id: InvoiceId) -> Result<Invoice, PortError> {
        let mut invoices = self.invoices.lock().unwrap();
        let invoice = invoices
            .get_mut(&id)
            .filter(|invoice| invoice.org_id() == org_id)
            .ok_or_else(|| PortError::not_found("Invoice", id))?;
        invoice.cancel().map_err(conflict_from_invalid_state)?;
        Ok(invoice.clone())
    }

    async fn mark_overdue_batch(
        &self,
        org_id: OrgId,
        now: DateTime<Utc>,
    ) -> Result<u64, PortError> {
        let mut invoices = self.invoices.lock().unwrap();
        let mut count = 0;
        for invoice in invoices.values_mut() {
            if invoice.org_id() == org_id
                && invoice.status() == InvoiceStatus::Open
                && invoice.mark_overdue(now).unwrap_or(false)
            {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn soft_delete(&self, org_id: OrgId, id: InvoiceId) -> Result<(), PortError> {
        let exists = self
            .invoices
            .lock()
            .unwrap()
            .get(&id)
            .is_some_and(|invoice| invoice.org_id() == org_id);
        if !exists {
            return Err(PortError::not_found("Invoice", id));
        }
        self.deleted.lock().unwrap().insert(id);
        Ok(())
    }
}

// ============================================================================
// Payments
// ============================================================================

/// In-memory payment store
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    payments: Mutex<HashMap<PaymentId, Payment>>,
    deleted: Mutex<HashSet<PaymentId>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.payments.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DomainPort for InMemoryPaymentRepository {}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn create(&self, payment: &Payment) -> Result<(), PortError> {
        let mut payments = self.payments.lock().unwrap();
        if payments.contains_key(&payment.id()) {
            return Err(PortError::conflict(format!(
                "Payment {} already exists",
                payment.id()
            )));
        }
        payments.insert(payment.id(), payment.clone());
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<(), PortError> {
        let mut payments = self.payments.lock().unwrap();
        match payments.get_mut(&payment.id()) {
            Some(stored) => {
                *stored = payment.clone();
                Ok(())
            }
            None => Err(PortError::not_found("Payment", payment.id())),
        }
    }

    async fn find_by_id(&self, org_id: OrgId, id: PaymentId) -> Result<Payment, PortError> {
        if self.deleted.lock().unwrap().contains(&id) {
            return Err(PortError::not_found("Payment", id));
        }
        self.payments
            .lock()
            .unwrap()
            .get(&id)
            .filter(|payment| payment.org_id() == org_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Payment", id))
    }

    async fn find_by_org(
        &self,
        org_id: OrgId,
        query: PaymentQuery,
    ) -> Result<Vec<Payment>, PortError> {
        let deleted = self.deleted.lock().unwrap().clone();
        let mut results: Vec<Payment> = self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|payment| payment.org_id() == org_id)
            .filter(|payment| !deleted.contains(&payment.id()))
            .filter(|payment| {
                query
                    .client_id
                    .is_none_or(|client_id| payment.client_id() == Some(client_id))
            })
            .filter(|payment| {
                query
                    .invoice_id
                    .is_none_or(|invoice_id| payment.invoice_id() == Some(invoice_id))
            })
            .filter(|payment| query.status.is_none_or(|status| payment.status() == status))
            .cloned()
            .collect();
        results.sort_by_key(|payment| payment.id());

        let offset = query.offset.unwrap_or(0) as usize;
        let results: Vec<Payment> = results.into_iter().skip(offset).collect();
        match query.limit {
            Some(limit) => Ok(results.into_iter().take(limit as usize).collect()),
            None => Ok(results),
        }
    }

    async fn find_in_period(
        &self,
        org_id: OrgId,
        period: Period,
    ) -> Result<Vec<Payment>, PortError> {
        let deleted = self.deleted.lock().unwrap().clone();
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|payment| payment.org_id() == org_id)
            .filter(|payment| !deleted.contains(&payment.id()))
            .filter(|payment| {
                let instant = payment.paid_at().unwrap_or_else(|| payment.created_at());
                period.contains(instant)
            })
            .cloned()
            .collect())
    }

    async fn soft_delete(&self, org_id: OrgId, id: PaymentId) -> Result<(), PortError> {
        let exists = self
            .payments
            .lock()
            .unwrap()
            .get(&id)
            .is_some_and(|payment| payment.org_id() == org_id);
        if !exists {
            return Err(PortError::not_found("Payment", id));
        }
        self.deleted.lock().unwrap().insert(id);
        Ok(())
    }
}

// ============================================================================
// Ledger entries
// ============================================================================

/// In-memory ledger store
#[derive(Default)]
pub struct InMemoryLedgerRepository {
    entries: Mutex<HashMap<LedgerEntryId, LedgerEntry>>,
    deleted: Mutex<HashSet<LedgerEntryId>>,
}

impl InMemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored entries, for test inspection
    pub fn all(&self) -> Vec<LedgerEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }
}

impl DomainPort for InMemoryLedgerRepository {}

#[async_trait]
impl LedgerEntryRepository for InMemoryLedgerRepository {
    async fn create(&self, entry: &LedgerEntry) -> Result<(), PortError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&entry.id) {
            return Err(PortError::conflict(format!(
                "Ledger entry {} already exists",
                entry.id
            )));
        }
        entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn update(&self, entry: &LedgerEntry) -> Result<(), PortError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&entry.id) {
            Some(stored) => {
                *stored = entry.clone();
                Ok(())
            }
            None => Err(PortError::not_found("LedgerEntry", entry.id)),
        }
    }

    async fn find_by_id(
        &self,
        org_id: OrgId,
        id: LedgerEntryId,
    ) -> Result<LedgerEntry, PortError> {
        if self.deleted.lock().unwrap().contains(&id) {
            return Err(PortError::not_found("LedgerEntry", id));
        }
        self.entries
            .lock()
            .unwrap()
            .get(&id)
            .filter(|entry| entry.org_id == org_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("LedgerEntry", id))
    }

    async fn find_by_org(
        &self,
        org_id: OrgId,
        query: LedgerQuery,
    ) -> Result<Vec<LedgerEntry>, PortError> {
        let deleted = self.deleted.lock().unwrap().clone();
        let mut results: Vec<LedgerEntry> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|entry| entry.org_id == org_id)
            .filter(|entry| !deleted.contains(&entry.id))
            .filter(|entry| {
                query
                    .entry_type
                    .is_none_or(|entry_type| entry.entry_type == entry_type)
            })
            .filter(|entry| {
                query
                    .client_id
                    .is_none_or(|client_id| entry.client_id == Some(client_id))
            })
            .filter(|entry| {
                query
                    .invoice_id
                    .is_none_or(|invoice_id| entry.invoice_id == Some(invoice_id))
            })
            .filter(|entry| query.dated_in.is_none_or(|window| window.contains(entry.date)))
            .cloned()
            .collect();
        results.sort_by_key(|entry| entry.id);

        let offset = query.offset.unwrap_or(0) as usize;
        let results: Vec<LedgerEntry> = results.into_iter().skip(offset).collect();
        match query.limit {
            Some(limit) => Ok(results.into_iter().take(limit as usize).collect()),
            None => Ok(results),
        }
    }

    async fn find_income_in_period(
        &self,
        org_id: OrgId,
        period: Period,
    ) -> Result<Vec<LedgerEntry>, PortError> {
        let window = DateRange::new(period.start.date_naive(), period.end.date_naive())
            .map_err(|err| PortError::validation(err.to_string()))?;
        self.find_by_org(
            org_id,
            LedgerQuery::by_type(domain_billing::EntryType::Income).dated_in(window),
        )
        .await
    }

    async fn exists_for_cost_item_in(
        &self,
        org_id: OrgId,
        cost_item_id: RecurringExpenseId,
        window: DateRange,
    ) -> Result<bool, PortError> {
        let deleted = self.deleted.lock().unwrap().clone();
        Ok(self.entries.lock().unwrap().values().any(|entry| {
            entry.org_id == org_id
                && entry.cost_item_id == Some(cost_item_id)
                && window.contains(entry.date)
                && !deleted.contains(&entry.id)
        }))
    }

    async fn soft_delete(&self, org_id: OrgId, id: LedgerEntryId) -> Result<(), PortError> {
        let exists = self
            .entries
            .lock()
            .unwrap()
            .get(&id)
            .is_some_and(|entry| entry.org_id == org_id);
        if !exists {
            return Err(PortError::not_found("LedgerEntry", id));
        }
        self.deleted.lock().unwrap().insert(id);
        Ok(())
    }
}

// ============================================================================
// Installments
// ============================================================================

/// In-memory installment store
#[derive(Default)]
pub struct InMemoryInstallmentRepository {
    installments: Mutex<HashMap<InstallmentId, Installment>>,
    deleted: Mutex<HashSet<InstallmentId>>,
}

impl InMemoryInstallmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomainPort for InMemoryInstallmentRepository {}

#[async_trait]
impl InstallmentRepository for InMemoryInstallmentRepository {
    async fn create(&self, installment: &Installment) -> Result<(), PortError> {
        let mut installments = self.installments.lock().unwrap();
        if installments.contains_key(&installment.id) {
            return Err(PortError::conflict(format!(
                "Installment {} already exists",
                installment.id
            )));
        }
        installments.insert(installment.id, installment.clone());
        Ok(())
    }

    async fn create_batch(&self, batch: &[Installment]) -> Result<(), PortError> {
        for installment in batch {
            self.create(installment).await?;
        }
        Ok(())
    }

    async fn update(&self, installment: &Installment) -> Result<(), PortError> {
        let mut installments = self.installments.lock().unwrap();
        match installments.get_mut(&installment.id) {
            Some(stored) => {
                *stored = installment.clone();
                Ok(())
            }
            None => Err(PortError::not_found("Installment", installment.id)),
        }
    }

    async fn find_by_id(&self, id: InstallmentId) -> Result<Installment, PortError> {
        if self.deleted.lock().unwrap().contains(&id) {
            return Err(PortError::not_found("Installment", id));
        }
        self.installments
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Installment", id))
    }

    async fn find_by_client(&self, client_id: ClientId) -> Result<Vec<Installment>, PortError> {
        let deleted = self.deleted.lock().unwrap().clone();
        let mut results: Vec<Installment> = self
            .installments
            .lock()
            .unwrap()
            .values()
            .filter(|installment| installment.client_id == client_id)
            .filter(|installment| !deleted.contains(&installment.id))
            .cloned()
            .collect();
        results.sort_by_key(|installment| installment.number);
        Ok(results)
    }

    async fn find_due_in(
        &self,
        client_id: ClientId,
        window: DateRange,
    ) -> Result<Vec<Installment>, PortError> {
        Ok(self
            .find_by_client(client_id)
            .await?
            .into_iter()
            .filter(|installment| installment.is_due_in(&window))
            .collect())
    }

    async fn soft_delete(&self, id: InstallmentId) -> Result<(), PortError> {
        if !self.installments.lock().unwrap().contains_key(&id) {
            return Err(PortError::not_found("Installment", id));
        }
        self.deleted.lock().unwrap().insert(id);
        Ok(())
    }
}

// ============================================================================
// Recurring expense definitions
// ============================================================================

/// In-memory recurring expense definition store
#[derive(Default)]
pub struct InMemoryRecurringExpenseRepository {
    definitions: Mutex<HashMap<RecurringExpenseId, RecurringExpenseDefinition>>,
    deleted: Mutex<HashSet<RecurringExpenseId>>,
}

impl InMemoryRecurringExpenseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomainPort for InMemoryRecurringExpenseRepository {}

#[async_trait]
impl RecurringExpenseRepository for InMemoryRecurringExpenseRepository {
    async fn create(&self, definition: &RecurringExpenseDefinition) -> Result<(), PortError> {
        let mut definitions = self.definitions.lock().unwrap();
        if definitions.contains_key(&definition.id) {
            return Err(PortError::conflict(format!(
                "Recurring expense {} already exists",
                definition.id
            )));
        }
        definitions.insert(definition.id, definition.clone());
        Ok(())
    }

    async fn update(&self, definition: &RecurringExpenseDefinition) -> Result<(), PortError> {
        let mut definitions = self.definitions.lock().unwrap();
        match definitions.get_mut(&definition.id) {
            Some(stored) => {
                *stored = definition.clone();
                Ok(())
            }
            None => Err(PortError::not_found("RecurringExpense", definition.id)),
        }
    }

    async fn find_by_id(
        &self,
        org_id: OrgId,
        id: RecurringExpenseId,
    ) -> Result<RecurringExpenseDefinition, PortError> {
        if self.deleted.lock().unwrap().contains(&id) {
            return Err(PortError::not_found("RecurringExpense", id));
        }
        self.definitions
            .lock()
            .unwrap()
            .get(&id)
            .filter(|definition| definition.org_id == org_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("RecurringExpense", id))
    }

    async fn find_by_org(
        &self,
        org_id: OrgId,
    ) -> Result<Vec<RecurringExpenseDefinition>, PortError> {
        let deleted = self.deleted.lock().unwrap().clone();
        let mut results: Vec<RecurringExpenseDefinition> = self
            .definitions
            .lock()
            .unwrap()
            .values()
            .filter(|definition| definition.org_id == org_id)
            .filter(|definition| !deleted.contains(&definition.id))
            .cloned()
            .collect();
        results.sort_by_key(|definition| definition.id);
        Ok(results)
    }

    async fn find_active_by_cycle(
        &self,
        org_id: OrgId,
        cycle: BillingCycle,
    ) -> Result<Vec<RecurringExpenseDefinition>, PortError> {
        Ok(self
            .find_by_org(org_id)
            .await?
            .into_iter()
            .filter(|definition| definition.active && definition.cycle == cycle)
            .collect())
    }

    async fn soft_delete(&self, org_id: OrgId, id: RecurringExpenseId) -> Result<(), PortError> {
        let exists = self
            .definitions
            .lock()
            .unwrap()
            .get(&id)
            .is_some_and(|definition| definition.org_id == org_id);
        if !exists {
            return Err(PortError::not_found("RecurringExpense", id));
        }
        self.deleted.lock().unwrap().insert(id);
        Ok(())
    }
}

// ============================================================================
// Clients
// ============================================================================

/// In-memory client store with an organisation registry
///
/// Organisations are registered explicitly (or implicitly by creating a
/// client); `first_org` follows registration order, mirroring the
/// single-tenant fallback policy.
#[derive(Default)]
pub struct InMemoryClientRepository {
    clients: Mutex<HashMap<ClientId, Client>>,
    orgs: Mutex<Vec<OrgId>>,
    deleted: Mutex<HashSet<ClientId>>,
}

impl InMemoryClientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an organisation without clients
    pub fn register_org(&self, org_id: OrgId) {
        let mut orgs = self.orgs.lock().unwrap();
        if !orgs.contains(&org_id) {
            orgs.push(org_id);
        }
    }
}

impl DomainPort for InMemoryClientRepository {}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn create(&self, client: &Client) -> Result<(), PortError> {
        self.register_org(client.org_id);
        let mut clients = self.clients.lock().unwrap();
        if clients.contains_key(&client.id) {
            return Err(PortError::conflict(format!(
                "Client {} already exists",
                client.id
            )));
        }
        clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn update(&self, client: &Client) -> Result<(), PortError> {
        let mut clients = self.clients.lock().unwrap();
        match clients.get_mut(&client.id) {
            Some(stored) => {
                *stored = client.clone();
                Ok(())
            }
            None => Err(PortError::not_found("Client", client.id)),
        }
    }

    async fn find_by_id(&self, org_id: OrgId, id: ClientId) -> Result<Client, PortError> {
        if self.deleted.lock().unwrap().contains(&id) {
            return Err(PortError::not_found("Client", id));
        }
        self.clients
            .lock()
            .unwrap()
            .get(&id)
            .filter(|client| client.org_id == org_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Client", id))
    }

    async fn find_active_by_org(&self, org_id: OrgId) -> Result<Vec<Client>, PortError> {
        let deleted = self.deleted.lock().unwrap().clone();
        let mut results: Vec<Client> = self
            .clients
            .lock()
            .unwrap()
            .values()
            .filter(|client| client.org_id == org_id && client.active)
            .filter(|client| !deleted.contains(&client.id))
            .cloned()
            .collect();
        results.sort_by_key(|client| client.id);
        Ok(results)
    }

    async fn org_of(&self, client_id: ClientId) -> Result<Option<OrgId>, PortError> {
        Ok(self
            .clients
            .lock()
            .unwrap()
            .get(&client_id)
            .map(|client| client.org_id))
    }

    async fn org_exists(&self, org_id: OrgId) -> Result<bool, PortError> {
        Ok(self.orgs.lock().unwrap().contains(&org_id))
    }

    async fn first_org(&self) -> Result<Option<OrgId>, PortError> {
        Ok(self.orgs.lock().unwrap().first().copied())
    }

    async fn soft_delete(&self, org_id: OrgId, id: ClientId) -> Result<(), PortError> {
        let exists = self
            .clients
            .lock()
            .unwrap()
            .get(&id)
            .is_some_and(|client| client.org_id == org_id);
        if !exists {
            return Err(PortError::not_found("Client", id));
        }
        self.deleted.lock().unwrap().insert(id);
        Ok(())
    }
}
