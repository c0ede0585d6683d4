//! Financial automation orchestrator
//!
//! Composes one full automation pass for an organisation: invoice
//! generation, the overdue bulk transition, and per-client status sync.
//! The cron trigger (or an administrative action) invokes this once per
//! cycle; per-item failures land in the report, and only an unknown
//! organisation aborts the run.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use core_kernel::{OrgId, Timezone};
use domain_billing::{ClientPaymentStatus, ClientRepository};

use crate::error::AutomationError;
use crate::notify::{
    dispatch_fire_and_forget, Notification, NotificationKind, NotificationPort,
    NotificationPriority,
};
use crate::overdue::OverdueAutomator;
use crate::report::AutomationRunReport;
use crate::scheduler::BillingScheduler;
use crate::status_sync::ClientStatusSync;

/// Runs the full financial automation pass for one organisation
pub struct FinancialAutomationOrchestrator {
    clients: Arc<dyn ClientRepository>,
    scheduler: BillingScheduler,
    overdue: OverdueAutomator,
    status_sync: ClientStatusSync,
    notifier: Arc<dyn NotificationPort>,
}

impl FinancialAutomationOrchestrator {
    pub fn new(
        clients: Arc<dyn ClientRepository>,
        scheduler: BillingScheduler,
        overdue: OverdueAutomator,
        status_sync: ClientStatusSync,
        notifier: Arc<dyn NotificationPort>,
    ) -> Self {
        Self {
            clients,
            scheduler,
            overdue,
            status_sync,
            notifier,
        }
    }

    /// Scheduler, overdue automator, then status sync, in that order
    pub async fn run_for_org(
        &self,
        org_id: OrgId,
        now: DateTime<Utc>,
        tz: Timezone,
    ) -> Result<AutomationRunReport, AutomationError> {
        if !self.clients.org_exists(org_id).await? {
            return Err(AutomationError::UnknownOrganization(org_id));
        }

        let mut report = AutomationRunReport::default();

        // 1. Invoice generation
        let schedule = self.scheduler.run_for_org(org_id, now, tz).await?;
        report.created = schedule.success.len();
        for item in &schedule.success {
            report.details.push(format!(
                "created invoice {} for client {} ({})",
                item.invoice_id, item.client_id, item.amount
            ));
        }
        for item in &schedule.blocked {
            report
                .details
                .push(format!("blocked client {}: {}", item.client_id, item.reason));
        }
        for item in &schedule.errors {
            report.errors += 1;
            report
                .details
                .push(format!("error for client {}: {}", item.client_id, item.message));
        }

        // 2. Overdue transitions
        let overdue = self.overdue.run_for_org(org_id, now).await?;
        report.updated += overdue.count as usize;
        if overdue.count > 0 {
            report
                .details
                .push(format!("{} invoices transitioned to overdue", overdue.count));
        }

        // 3. Per-client status sync
        for mut client in self.clients.find_active_by_org(org_id).await? {
            report.processed += 1;
            match self.status_sync.sync_client(org_id, &mut client).await {
                Ok(true) => {
                    report.updated += 1;
                    report.details.push(format!(
                        "client {} payment status is now {:?}",
                        client.id, client.payment_status
                    ));
                    if client.payment_status == ClientPaymentStatus::Overdue {
                        dispatch_fire_and_forget(
                            self.notifier.as_ref(),
                            Notification {
                                org_id,
                                kind: NotificationKind::PaymentOverdue,
                                title: format!("{} has overdue invoices", client.name),
                                message: format!(
                                    "Client {} has at least one overdue invoice",
                                    client.name
                                ),
                                link: format!("/clients/{}/finance", client.id),
                                client_id: Some(client.id),
                                priority: NotificationPriority::High,
                            },
                        )
                        .await;
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    report.errors += 1;
                    report
                        .details
                        .push(format!("status sync failed for client {}: {}", client.id, err));
                }
            }
        }

        tracing::info!(
            %org_id,
            processed = report.processed,
            created = report.created,
            updated = report.updated,
            errors = report.errors,
            "automation run complete"
        );

        Ok(report)
    }
}
