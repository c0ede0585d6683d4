//! Invoice lifecycle
//!
//! An invoice is an itemized bill owed by a client. Its fields are private:
//! every mutation goes through a lifecycle method that checks the current
//! status first, so an invoice can never be edited into an inconsistent
//! state by direct assignment. Once an invoice reaches `Paid` or
//! `Cancelled` its total is frozen.
//!
//! Invoices are never physically deleted; cancellation is a terminal
//! status, not removal.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{ClientId, Currency, InvoiceId, Money, OrgId};

use crate::error::BillingError;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Issued and awaiting payment
    Open,
    /// Fully paid
    Paid,
    /// Past due date
    Overdue,
    /// Cancelled/voided
    Cancelled,
}

impl InvoiceStatus {
    /// Returns true if no further lifecycle transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

/// How an invoice came to exist
///
/// The storage layer keys its one-per-month uniqueness backstop on
/// `ScheduledMonthly`; installment invoices deliberately allow several
/// per month, and manual invoices are unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceOrigin {
    /// Entered by a user
    Manual,
    /// Generated by the billing scheduler for a monthly contract
    ScheduledMonthly,
    /// Generated by the billing scheduler from an installment plan
    ScheduledInstallment,
}

/// A line item on an invoice
///
/// The item total is computed once at construction, so restoring an item
/// from persistence re-derives and re-checks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    id: Uuid,
    description: String,
    quantity: Decimal,
    unit_amount: Money,
    total: Money,
}

impl InvoiceItem {
    /// Creates a new invoice item
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty description or a
    /// non-positive quantity.
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit_amount: Money,
    ) -> Result<Self, BillingError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(BillingError::validation("Item description cannot be empty"));
        }
        if quantity <= Decimal::ZERO {
            return Err(BillingError::validation(format!(
                "Item quantity must be positive, got {}",
                quantity
            )));
        }
        let total = unit_amount.multiply(quantity)?;
        Ok(Self {
            id: Uuid::new_v4(),
            description,
            quantity,
            unit_amount,
            total,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn unit_amount(&self) -> Money {
        self.unit_amount
    }

    /// quantity × unit amount
    pub fn total(&self) -> Money {
        self.total
    }
}

/// Persisted invoice state, as read back from a repository
///
/// `Invoice::restore` trusts the field shapes but re-validates the
/// cross-field invariants before handing out an entity.
#[derive(Debug, Clone)]
pub struct InvoiceSnapshot {
    pub id: InvoiceId,
    pub org_id: OrgId,
    pub client_id: ClientId,
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<InvoiceItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
    pub status: InvoiceStatus,
    pub origin: InvoiceOrigin,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An itemized bill owed by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    org_id: OrgId,
    client_id: ClientId,
    number: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    items: Vec<InvoiceItem>,
    subtotal: Money,
    discount: Money,
    tax: Money,
    total: Money,
    status: InvoiceStatus,
    origin: InvoiceOrigin,
    paid_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates a new open invoice, enforcing creation-time invariants
    ///
    /// `subtotal` is derived from the items and
    /// `total = subtotal - discount + tax`; a discount larger than the
    /// subtotal is rejected.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty item list, mismatched
    /// currencies, a due date before the issue date, or an over-sized
    /// discount.
    pub fn create(
        org_id: OrgId,
        client_id: ClientId,
        number: impl Into<String>,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        items: Vec<InvoiceItem>,
        discount: Money,
        tax: Money,
    ) -> Result<Self, BillingError> {
        let number = number.into();
        if number.trim().is_empty() {
            return Err(BillingError::validation("Invoice number cannot be empty"));
        }
        if items.is_empty() {
            return Err(BillingError::validation(
                "Invoice must have at least one item",
            ));
        }
        if due_date < issue_date {
            return Err(BillingError::validation(format!(
                "Due date {} is before issue date {}",
                due_date, issue_date
            )));
        }

        let currency = items[0].unit_amount().currency();
        let subtotal = Self::sum_items(&items, currency)?;
        let total = Self::compute_total(&subtotal, &discount, &tax)?;

        let now = Utc::now();
        Ok(Self {
            id: InvoiceId::new_v7(),
            org_id,
            client_id,
            number,
            issue_date,
            due_date,
            items,
            subtotal,
            discount,
            tax,
            total,
            status: InvoiceStatus::Open,
            origin: InvoiceOrigin::Manual,
            paid_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Restores an invoice from persisted state
    ///
    /// Trusts the persisted field shapes but re-validates the cross-field
    /// invariants: the stored subtotal must match the items and the stored
    /// total must match `subtotal - discount + tax`.
    pub fn restore(snapshot: InvoiceSnapshot) -> Result<Self, BillingError> {
        let currency = snapshot.subtotal.currency();
        if !snapshot.items.is_empty() {
            let derived = Self::sum_items(&snapshot.items, currency)?;
            if derived != snapshot.subtotal {
                return Err(BillingError::validation(format!(
                    "Stored subtotal {} does not match items total {}",
                    snapshot.subtotal, derived
                )));
            }
        }
        let derived_total =
            Self::compute_total(&snapshot.subtotal, &snapshot.discount, &snapshot.tax)?;
        if derived_total != snapshot.total {
            return Err(BillingError::validation(format!(
                "Stored total {} does not match subtotal - discount + tax = {}",
                snapshot.total, derived_total
            )));
        }

        Ok(Self {
            id: snapshot.id,
            org_id: snapshot.org_id,
            client_id: snapshot.client_id,
            number: snapshot.number,
            issue_date: snapshot.issue_date,
            due_date: snapshot.due_date,
            items: snapshot.items,
            subtotal: snapshot.subtotal,
            discount: snapshot.discount,
            tax: snapshot.tax,
            total: snapshot.total,
            status: snapshot.status,
            origin: snapshot.origin,
            paid_at: snapshot.paid_at,
            notes: snapshot.notes,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        })
    }

    fn sum_items(items: &[InvoiceItem], currency: Currency) -> Result<Money, BillingError> {
        let mut subtotal = Money::zero(currency);
        for item in items {
            subtotal = subtotal.checked_add(&item.total())?;
        }
        Ok(subtotal)
    }

    fn compute_total(
        subtotal: &Money,
        discount: &Money,
        tax: &Money,
    ) -> Result<Money, BillingError> {
        let after_discount = subtotal.checked_sub(discount).map_err(|err| match err {
            core_kernel::MoneyError::NegativeAmount(_) => BillingError::validation(format!(
                "Discount {} exceeds subtotal {}",
                discount, subtotal
            )),
            other => BillingError::Money(other),
        })?;
        after_discount.checked_add(tax).map_err(BillingError::from)
    }

    /// Sets free-form notes on a not-yet-persisted invoice
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Tags how this invoice was generated
    pub fn with_origin(mut self, origin: InvoiceOrigin) -> Self {
        self.origin = origin;
        self
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Marks the invoice as paid
    ///
    /// Allowed only from `Open` or `Overdue`. `paid_at` defaults to now.
    pub fn pay(&mut self, paid_at: Option<DateTime<Utc>>) -> Result<(), BillingError> {
        match self.status {
            InvoiceStatus::Open | InvoiceStatus::Overdue => {
                self.status = InvoiceStatus::Paid;
                self.paid_at = Some(paid_at.unwrap_or_else(Utc::now));
                self.updated_at = Utc::now();
                Ok(())
            }
            status => Err(BillingError::invalid_state(format!(
                "Cannot pay invoice {} in status {:?}",
                self.number, status
            ))),
        }
    }

    /// Cancels the invoice
    ///
    /// Allowed only from `Open` or `Overdue`; cancellation is terminal.
    pub fn cancel(&mut self) -> Result<(), BillingError> {
        match self.status {
            InvoiceStatus::Open | InvoiceStatus::Overdue => {
                self.status = InvoiceStatus::Cancelled;
                self.updated_at = Utc::now();
                Ok(())
            }
            status => Err(BillingError::invalid_state(format!(
                "Cannot cancel invoice {} in status {:?}",
                self.number, status
            ))),
        }
    }

    /// Transitions an open, past-due invoice to `Overdue`
    ///
    /// Returns `Ok(true)` when the transition happened, `Ok(false)` when
    /// nothing changed (already overdue, or not yet past due). Applying
    /// this to a paid or cancelled invoice is an error.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> Result<bool, BillingError> {
        match self.status {
            InvoiceStatus::Overdue => Ok(false),
            InvoiceStatus::Open => {
                if now.date_naive() > self.due_date {
                    self.status = InvoiceStatus::Overdue;
                    self.updated_at = Utc::now();
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            status => Err(BillingError::invalid_state(format!(
                "Cannot mark invoice {} overdue in status {:?}",
                self.number, status
            ))),
        }
    }

    /// Returns true if the due date has passed and the invoice is not settled
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() > self.due_date && !self.status.is_terminal()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> InvoiceId {
        self.id
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn issue_date(&self) -> NaiveDate {
        self.issue_date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn items(&self) -> &[InvoiceItem] {
        &self.items
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    pub fn tax(&self) -> Money {
        self.tax
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn currency(&self) -> Currency {
        self.total.currency()
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn origin(&self) -> InvoiceOrigin {
        self.origin
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Generates a unique human-readable invoice number
///
/// Timestamp plus a process-local sequence, so a batch issuing several
/// invoices inside one millisecond still gets distinct numbers.
pub fn generate_invoice_number() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static SEQUENCE: AtomicU64 = AtomicU64::new(0);

    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("INV-{}{:03}", duration.as_millis() % 10_000_000_000, sequence)
}
