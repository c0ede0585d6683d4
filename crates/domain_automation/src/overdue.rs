//! Overdue transition automator
//!
//! One bulk conditional update per organisation: every open invoice whose
//! due date has passed becomes overdue. The state precondition lives in
//! the store's WHERE clause, so the operation is atomic and a second run
//! finds nothing left to transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use core_kernel::OrgId;
use domain_billing::InvoiceRepository;

use crate::error::AutomationError;
use crate::report::OverdueReport;

/// Batch-transitions past-due open invoices to overdue
pub struct OverdueAutomator {
    invoices: Arc<dyn InvoiceRepository>,
}

impl OverdueAutomator {
    pub fn new(invoices: Arc<dyn InvoiceRepository>) -> Self {
        Self { invoices }
    }

    /// Runs the bulk transition and returns the affected row count
    pub async fn run_for_org(
        &self,
        org_id: OrgId,
        now: DateTime<Utc>,
    ) -> Result<OverdueReport, AutomationError> {
        let count = self.invoices.mark_overdue_batch(org_id, now).await?;
        if count > 0 {
            tracing::info!(%org_id, count, "invoices transitioned to overdue");
        }
        Ok(OverdueReport { count })
    }
}
