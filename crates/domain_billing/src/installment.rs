//! Client installments
//!
//! When a client contract is marked installment-based, the contract value
//! is split into a batch of installments up front. The billing scheduler
//! consumes them to decide the per-cycle amount: one income event per
//! installment due in the current month.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::temporal::clamped_day_of_month;
use core_kernel::{ClientId, DateRange, InstallmentId, Money};

use crate::error::BillingError;

/// Installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Late,
}

/// One slice of an installment-based contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub client_id: ClientId,
    /// 1-based position in the plan
    pub number: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Installment {
    /// Creates a single installment
    pub fn new(
        client_id: ClientId,
        number: u32,
        amount: Money,
        due_date: NaiveDate,
    ) -> Result<Self, BillingError> {
        if number == 0 {
            return Err(BillingError::validation(
                "Installment number must be 1-based",
            ));
        }
        if amount.is_zero() {
            return Err(BillingError::validation(
                "Installment amount must be positive",
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: InstallmentId::new_v7(),
            client_id,
            number,
            amount,
            due_date,
            status: InstallmentStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Splits a contract value into a monthly installment plan
    ///
    /// The total is allocated into `count` parts that sum exactly to the
    /// original amount; due dates advance month by month from `first_due`,
    /// keeping its day-of-month clamped to each month's last valid day.
    pub fn plan(
        client_id: ClientId,
        total: Money,
        count: u32,
        first_due: NaiveDate,
    ) -> Result<Vec<Installment>, BillingError> {
        if count == 0 {
            return Err(BillingError::validation(
                "Installment plan needs at least one installment",
            ));
        }
        let amounts = total.allocate(count)?;

        let day = first_due.day();
        let mut installments = Vec::with_capacity(count as usize);
        for (i, amount) in amounts.into_iter().enumerate() {
            let months_ahead = i as i32;
            let total_months = first_due.month() as i32 - 1 + months_ahead;
            let year = first_due.year() + total_months.div_euclid(12);
            let month = (total_months.rem_euclid(12) + 1) as u32;
            let due_date = clamped_day_of_month(year, month, day)?;
            installments.push(Installment::new(client_id, i as u32 + 1, amount, due_date)?);
        }
        Ok(installments)
    }

    /// Returns true if this installment falls due inside the window
    pub fn is_due_in(&self, window: &DateRange) -> bool {
        window.contains(self.due_date)
    }

    /// Transitions a pending installment past its due date to `Late`
    ///
    /// Returns `Ok(true)` when the transition happened. Already-late
    /// installments are a no-op; a paid installment cannot go late.
    pub fn mark_late(&mut self, now: DateTime<Utc>) -> Result<bool, BillingError> {
        match self.status {
            InstallmentStatus::Late => Ok(false),
            InstallmentStatus::Pending => {
                if now.date_naive() > self.due_date {
                    self.status = InstallmentStatus::Late;
                    self.updated_at = Utc::now();
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            InstallmentStatus::Paid => Err(BillingError::invalid_state(format!(
                "Cannot mark paid installment {} late",
                self.id
            ))),
        }
    }

    /// Settles the installment
    pub fn mark_paid(&mut self) -> Result<(), BillingError> {
        match self.status {
            InstallmentStatus::Pending | InstallmentStatus::Late => {
                self.status = InstallmentStatus::Paid;
                self.updated_at = Utc::now();
                Ok(())
            }
            InstallmentStatus::Paid => Err(BillingError::invalid_state(format!(
                "Installment {} is already paid",
                self.id
            ))),
        }
    }
}
