//! Revenue reporting
//!
//! The query-side entry point dashboards call for a period's revenue
//! figure: read the income entries and payment records for the window,
//! then hand both streams to the reconciliation engine.

use std::sync::Arc;

use core_kernel::{Currency, DateRange, OrgId, Timezone};

use crate::error::BillingError;
use crate::ports::{LedgerEntryRepository, PaymentRepository};
use crate::reconciliation::{reconcile_revenue, ReconciledRevenue};

/// Computes deduplicated revenue figures from the two stores
pub struct RevenueReportService {
    ledger: Arc<dyn LedgerEntryRepository>,
    payments: Arc<dyn PaymentRepository>,
}

impl RevenueReportService {
    pub fn new(
        ledger: Arc<dyn LedgerEntryRepository>,
        payments: Arc<dyn PaymentRepository>,
    ) -> Self {
        Self { ledger, payments }
    }

    /// The revenue figure for a calendar window in the org's locale
    pub async fn revenue_for_window(
        &self,
        org_id: OrgId,
        window: DateRange,
        tz: Timezone,
        currency: Currency,
    ) -> Result<ReconciledRevenue, BillingError> {
        let period = window.to_period(&tz);
        let entries = self.ledger.find_income_in_period(org_id, period).await?;
        let payments = self.payments.find_in_period(org_id, period).await?;

        reconcile_revenue(&entries, &payments, currency)
    }
}
