//! Ledger entries
//!
//! A ledger entry is the generic income/expense record, independent of
//! the invoice/payment subsystem. Entries are written by the billing
//! scheduler (on invoice payment), by the recurring-expense materializer,
//! by gateway ingestion, and by manual bookkeeping; the sum of income
//! entries over a period, after deduplication against payment records, is
//! the revenue figure.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, InvoiceId, LedgerEntryId, Money, OrgId, RecurringExpenseId};

use crate::error::BillingError;

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Income,
    Expense,
}

/// Entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// A generic income or expense record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub org_id: OrgId,
    pub entry_type: EntryType,
    /// Free-form classification; see the `SUBTYPE_*` constants for the
    /// values written by the automation services
    pub subtype: String,
    pub amount: Money,
    pub date: NaiveDate,
    pub status: EntryStatus,
    pub invoice_id: Option<InvoiceId>,
    pub client_id: Option<ClientId>,
    /// The recurring-expense definition this entry was materialized from
    pub cost_item_id: Option<RecurringExpenseId>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Income recorded when an invoice is paid
    pub const SUBTYPE_INVOICE_PAYMENT: &'static str = "invoice_payment";
    /// Expense materialized from a recurring definition
    pub const SUBTYPE_RECURRING_EXPENSE: &'static str = "recurring_expense";
    /// Manually entered record
    pub const SUBTYPE_MANUAL: &'static str = "manual";

    /// Creates a new confirmed ledger entry
    pub fn new(
        org_id: OrgId,
        entry_type: EntryType,
        subtype: impl Into<String>,
        amount: Money,
        date: NaiveDate,
    ) -> Result<Self, BillingError> {
        let subtype = subtype.into();
        if subtype.trim().is_empty() {
            return Err(BillingError::validation("Entry subtype cannot be empty"));
        }
        let now = Utc::now();
        Ok(Self {
            id: LedgerEntryId::new_v7(),
            org_id,
            entry_type,
            subtype,
            amount,
            date,
            status: EntryStatus::Confirmed,
            invoice_id: None,
            client_id: None,
            cost_item_id: None,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        })
    }

    /// Links the entry to an invoice (the reconciliation dedup key)
    pub fn with_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    /// Links the entry to a client
    pub fn with_client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Links the entry to the recurring-expense definition it came from
    pub fn with_cost_item(mut self, cost_item_id: RecurringExpenseId) -> Self {
        self.cost_item_id = Some(cost_item_id);
        self
    }

    /// Attaches structured metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Marks a pending entry as confirmed
    pub fn confirm(&mut self) -> Result<(), BillingError> {
        match self.status {
            EntryStatus::Pending => {
                self.status = EntryStatus::Confirmed;
                self.updated_at = Utc::now();
                Ok(())
            }
            status => Err(BillingError::invalid_state(format!(
                "Cannot confirm ledger entry {} in status {:?}",
                self.id, status
            ))),
        }
    }

    /// Cancels the entry; cancelled entries are excluded from revenue
    pub fn cancel(&mut self) -> Result<(), BillingError> {
        match self.status {
            EntryStatus::Pending | EntryStatus::Confirmed => {
                self.status = EntryStatus::Cancelled;
                self.updated_at = Utc::now();
                Ok(())
            }
            EntryStatus::Cancelled => Err(BillingError::invalid_state(format!(
                "Ledger entry {} is already cancelled",
                self.id
            ))),
        }
    }

    /// Returns true for income entries that count toward revenue
    pub fn counts_as_revenue(&self) -> bool {
        self.entry_type == EntryType::Income && self.status != EntryStatus::Cancelled
    }
}
