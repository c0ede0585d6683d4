//! Billing view of a client
//!
//! The wider application owns the full client profile; the billing core
//! only needs the contract fields that drive invoice generation and the
//! aggregate payment status recomputed by the status-sync step.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, Money, OrgId};

use crate::error::BillingError;

/// How a client's contract is charged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    /// One invoice per month at the contract value
    Monthly,
    /// Invoices follow the client's installment plan
    Installments,
}

/// Aggregate payment health across a client's invoice set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientPaymentStatus {
    Paid,
    Pending,
    Overdue,
}

/// A client, as billing sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub org_id: OrgId,
    pub name: String,
    pub active: bool,
    pub contract_start: Option<NaiveDate>,
    pub contract_end: Option<NaiveDate>,
    pub contract_value: Money,
    /// Day of month invoices fall due, clamped to each month's last day
    pub payment_day: u32,
    pub billing_mode: BillingMode,
    pub payment_status: ClientPaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Creates a new active client
    pub fn create(
        org_id: OrgId,
        name: impl Into<String>,
        contract_value: Money,
        payment_day: u32,
        billing_mode: BillingMode,
    ) -> Result<Self, BillingError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BillingError::validation("Client name cannot be empty"));
        }
        if payment_day == 0 || payment_day > 31 {
            return Err(BillingError::validation(format!(
                "Payment day must be between 1 and 31, got {}",
                payment_day
            )));
        }
        let now = Utc::now();
        Ok(Self {
            id: ClientId::new_v7(),
            org_id,
            name,
            active: true,
            contract_start: None,
            contract_end: None,
            contract_value,
            payment_day,
            billing_mode,
            payment_status: ClientPaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sets the contract window on a not-yet-persisted client
    pub fn with_contract_window(
        mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, BillingError> {
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(BillingError::validation(format!(
                    "Contract end {} is before contract start {}",
                    end, start
                )));
            }
        }
        self.contract_start = start;
        self.contract_end = end;
        Ok(self)
    }

    /// True when the contract has a future start date
    pub fn contract_not_started(&self, today: NaiveDate) -> bool {
        self.contract_start.is_some_and(|start| start > today)
    }

    /// True when the contract has an elapsed end date
    pub fn contract_ended(&self, today: NaiveDate) -> bool {
        self.contract_end.is_some_and(|end| end < today)
    }

    /// Replaces the aggregate payment status (status-sync step)
    ///
    /// Returns true when the status actually changed.
    pub fn set_payment_status(&mut self, status: ClientPaymentStatus) -> bool {
        if self.payment_status == status {
            return false;
        }
        self.payment_status = status;
        self.updated_at = Utc::now();
        true
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }
}
