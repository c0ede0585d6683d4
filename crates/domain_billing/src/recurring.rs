//! Recurring expense definitions
//!
//! A definition is long-lived configuration that produces at most one
//! concrete ledger entry per cycle through materialization. The
//! idempotency window is the calendar month (or year); the entry date is
//! the configured day-of-month clamped to the month's last valid day and
//! never later than the run date.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::temporal::clamped_day_of_month;
use core_kernel::{BillingCycle, ClientId, Money, OrgId, RecurringExpenseId, TemporalError};

use crate::error::BillingError;

/// Long-lived configuration for a recurring expense
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringExpenseDefinition {
    pub id: RecurringExpenseId,
    pub org_id: OrgId,
    pub name: String,
    pub amount: Money,
    pub cycle: BillingCycle,
    /// Day the expense falls on; defaults to the 1st when absent
    pub day_of_month: Option<u32>,
    pub active: bool,
    /// Set when the expense is attributable to a specific client
    pub client_id: Option<ClientId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringExpenseDefinition {
    /// Creates a new active definition
    pub fn create(
        org_id: OrgId,
        name: impl Into<String>,
        amount: Money,
        cycle: BillingCycle,
    ) -> Result<Self, BillingError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BillingError::validation(
                "Recurring expense name cannot be empty",
            ));
        }
        if amount.is_zero() {
            return Err(BillingError::validation(
                "Recurring expense amount must be positive",
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: RecurringExpenseId::new_v7(),
            org_id,
            name,
            amount,
            cycle,
            day_of_month: None,
            active: true,
            client_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sets the day of month the expense falls on
    pub fn with_day_of_month(mut self, day: u32) -> Result<Self, BillingError> {
        if day == 0 || day > 31 {
            return Err(BillingError::Temporal(TemporalError::InvalidDayOfMonth(day)));
        }
        self.day_of_month = Some(day);
        Ok(self)
    }

    /// Attributes the expense to a client
    pub fn with_client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Stops future materialization; existing entries are untouched
    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }

    /// The date a materialized entry gets in the cycle containing `today`
    ///
    /// The configured day is clamped to the month's last valid day, and
    /// the result is never later than `today` (an expense configured for
    /// the 25th, materialized on the 10th, is dated the 10th).
    pub fn entry_date_for(&self, today: NaiveDate) -> Result<NaiveDate, TemporalError> {
        let day = self.day_of_month.unwrap_or(1);
        let scheduled = clamped_day_of_month(today.year(), today.month(), day)?;
        Ok(scheduled.min(today))
    }
}
