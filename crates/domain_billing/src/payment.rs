//! Payment state machine
//!
//! A payment is a record of funds received. Its lifecycle is independent
//! of any invoice it may be linked to: the only legal forward edges are
//! Pending → Processed → Verified → Refunded, with Failed reachable from
//! the pre-verification states only. A verified payment is immutable with
//! respect to failure.
//!
//! `Late` is an overdue `Pending`: a payment whose due date has passed
//! without processing. It can still be processed or failed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, InvoiceId, Money, OrgId, PaymentId};

use crate::error::BillingError;
use crate::invoice::Invoice;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    BankTransfer,
    CreditCard,
    DebitCard,
    Boleto,
    Cash,
    Other,
}

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Recorded, not yet processed
    Pending,
    /// Accepted by the processor
    Processed,
    /// Funds confirmed
    Verified,
    /// Past due without processing
    Late,
    /// Processing failed
    Failed,
    /// Refunded after verification
    Refunded,
}

/// Persisted payment state, as read back from a repository
#[derive(Debug, Clone)]
pub struct PaymentSnapshot {
    pub id: PaymentId,
    pub org_id: OrgId,
    pub invoice_id: Option<InvoiceId>,
    pub client_id: Option<ClientId>,
    pub amount: Money,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refunded_amount: Option<Money>,
    pub failure_reason: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A record of funds received
///
/// State is private; all mutation goes through the transition methods,
/// which fail fast with an `InvalidState` error on an illegal edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    org_id: OrgId,
    invoice_id: Option<InvoiceId>,
    client_id: Option<ClientId>,
    amount: Money,
    status: PaymentStatus,
    method: PaymentMethod,
    due_date: Option<NaiveDate>,
    paid_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    verified_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    refunded_amount: Option<Money>,
    failure_reason: Option<String>,
    reference: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new pending payment not linked to any invoice
    ///
    /// Ad-hoc receipts (cash, unmatched transfers) are valid payments.
    pub fn create(
        org_id: OrgId,
        client_id: Option<ClientId>,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<Self, BillingError> {
        if amount.is_zero() {
            return Err(BillingError::validation("Payment amount must be positive"));
        }
        let now = Utc::now();
        Ok(Self {
            id: PaymentId::new_v7(),
            org_id,
            invoice_id: None,
            client_id,
            amount,
            status: PaymentStatus::Pending,
            method,
            due_date: None,
            paid_at: None,
            processed_at: None,
            verified_at: None,
            refunded_at: None,
            refunded_amount: None,
            failure_reason: None,
            reference: None,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Creates a new pending payment against an invoice
    ///
    /// The payment inherits the invoice's organisation and client, which
    /// keeps the linkage invariant satisfied by construction.
    pub fn create_for_invoice(
        invoice: &Invoice,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<Self, BillingError> {
        let mut payment = Self::create(invoice.org_id(), Some(invoice.client_id()), amount, method)?;
        payment.invoice_id = Some(invoice.id());
        Ok(payment)
    }

    /// Sets the payment due date on a not-yet-persisted payment
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Restores a payment from persisted state
    ///
    /// Trusts the field shapes but re-validates the refund bound.
    pub fn restore(snapshot: PaymentSnapshot) -> Result<Self, BillingError> {
        if let Some(refunded) = &snapshot.refunded_amount {
            if refunded.amount() > snapshot.amount.amount() {
                return Err(BillingError::validation(format!(
                    "Stored refunded amount {} exceeds payment amount {}",
                    refunded, snapshot.amount
                )));
            }
        }
        Ok(Self {
            id: snapshot.id,
            org_id: snapshot.org_id,
            invoice_id: snapshot.invoice_id,
            client_id: snapshot.client_id,
            amount: snapshot.amount,
            status: snapshot.status,
            method: snapshot.method,
            due_date: snapshot.due_date,
            paid_at: snapshot.paid_at,
            processed_at: snapshot.processed_at,
            verified_at: snapshot.verified_at,
            refunded_at: snapshot.refunded_at,
            refunded_amount: snapshot.refunded_amount,
            failure_reason: snapshot.failure_reason,
            reference: snapshot.reference,
            notes: snapshot.notes,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        })
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Marks the payment as accepted by the processor
    ///
    /// Requires `Pending` (or `Late`, which is an overdue pending).
    pub fn process(&mut self, reference: Option<String>) -> Result<(), BillingError> {
        match self.status {
            PaymentStatus::Pending | PaymentStatus::Late => {
                self.status = PaymentStatus::Processed;
                self.processed_at = Some(Utc::now());
                if reference.is_some() {
                    self.reference = reference;
                }
                self.updated_at = Utc::now();
                Ok(())
            }
            status => Err(BillingError::invalid_state(format!(
                "Cannot process payment {} in status {:?}",
                self.id, status
            ))),
        }
    }

    /// Confirms the funds
    ///
    /// Requires `Processed`. Re-verifying an already verified payment is
    /// an error, not a no-op.
    pub fn verify(&mut self) -> Result<(), BillingError> {
        match self.status {
            PaymentStatus::Processed => {
                self.status = PaymentStatus::Verified;
                self.verified_at = Some(Utc::now());
                self.updated_at = Utc::now();
                Ok(())
            }
            status => Err(BillingError::invalid_state(format!(
                "Cannot verify payment {} in status {:?}",
                self.id, status
            ))),
        }
    }

    /// Marks the payment as failed with a reason
    ///
    /// A verified (or refunded) payment cannot fail.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), BillingError> {
        match self.status {
            PaymentStatus::Pending | PaymentStatus::Late | PaymentStatus::Processed => {
                self.status = PaymentStatus::Failed;
                self.failure_reason = Some(reason.into());
                self.updated_at = Utc::now();
                Ok(())
            }
            status => Err(BillingError::invalid_state(format!(
                "Cannot fail payment {} in status {:?}",
                self.id, status
            ))),
        }
    }

    /// Refunds the payment, fully or partially
    ///
    /// Requires `Verified`. A refund exceeding the payment amount is a
    /// validation error; omitting the amount refunds in full.
    pub fn refund(&mut self, amount: Option<Money>) -> Result<(), BillingError> {
        if !self.can_be_refunded() {
            return Err(BillingError::invalid_state(format!(
                "Cannot refund payment {} in status {:?}",
                self.id, self.status
            )));
        }
        let refunded = amount.unwrap_or(self.amount);
        if refunded.currency() != self.amount.currency() {
            return Err(BillingError::validation(format!(
                "Refund currency {} does not match payment currency {}",
                refunded.currency(),
                self.amount.currency()
            )));
        }
        if refunded.amount() > self.amount.amount() {
            return Err(BillingError::validation(format!(
                "Refund amount {} exceeds payment amount {}",
                refunded, self.amount
            )));
        }
        self.status = PaymentStatus::Refunded;
        self.refunded_at = Some(Utc::now());
        self.refunded_amount = Some(refunded);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transitions a pending payment past its due date to `Late`
    ///
    /// Returns `Ok(true)` when the transition happened, `Ok(false)` when
    /// nothing changed. No due date means never late.
    pub fn mark_late(&mut self, now: DateTime<Utc>) -> Result<bool, BillingError> {
        match self.status {
            PaymentStatus::Late => Ok(false),
            PaymentStatus::Pending => match self.due_date {
                Some(due) if now.date_naive() > due => {
                    self.status = PaymentStatus::Late;
                    self.updated_at = Utc::now();
                    Ok(true)
                }
                _ => Ok(false),
            },
            status => Err(BillingError::invalid_state(format!(
                "Cannot mark payment {} late in status {:?}",
                self.id, status
            ))),
        }
    }

    /// Appends a line to the payment's notes log
    ///
    /// Notes are newline-joined in arrival order. Empty or whitespace-only
    /// text is rejected.
    pub fn add_note(&mut self, text: impl Into<String>) -> Result<(), BillingError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(BillingError::validation("Note text cannot be empty"));
        }
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{}\n{}", existing, text),
            None => text,
        });
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records when the payer actually paid (from a gateway event)
    pub fn set_paid_at(&mut self, paid_at: DateTime<Utc>) {
        self.paid_at = Some(paid_at);
        self.updated_at = Utc::now();
    }

    /// Only a verified payment can be refunded
    pub fn can_be_refunded(&self) -> bool {
        self.status == PaymentStatus::Verified
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    pub fn invoice_id(&self) -> Option<InvoiceId> {
        self.invoice_id
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn verified_at(&self) -> Option<DateTime<Utc>> {
        self.verified_at
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    pub fn refunded_amount(&self) -> Option<Money> {
        self.refunded_amount
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
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
