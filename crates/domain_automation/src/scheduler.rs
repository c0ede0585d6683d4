//! Billing scheduler
//!
//! Decides, per active client, whether an invoice must be generated for
//! the current calendar month. Contract dates and already-issued invoices
//! produce named blocks; installment-based clients generate one invoice
//! per installment due this month; everyone else gets one invoice at the
//! contract value, dated to the client's payment day.
//!
//! The month-existence check is an application-level read-then-write
//! guard. It is not transactionally safe against two concurrent runs;
//! the storage layer backstops it with a uniqueness constraint on the
//! (client, month) key, which surfaces here as a per-client error rather
//! than a duplicate invoice.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;

use core_kernel::temporal::clamped_day_of_month;
use core_kernel::{DateRange, Money, OrgId, Timezone};
use domain_billing::{
    generate_invoice_number, BillingError, BillingMode, Client, ClientRepository,
    InstallmentRepository, InstallmentStatus, Invoice, InvoiceItem, InvoiceOrigin,
    InvoiceRepository,
};

use crate::error::AutomationError;
use crate::notify::{
    dispatch_fire_and_forget, Notification, NotificationKind, NotificationPort,
    NotificationPriority,
};
use crate::report::{BlockReason, BlockedClient, ClientFailure, CreatedInvoice, ScheduleRunReport};

/// Outcome of generation for a single client
enum ClientOutcome {
    Created(Vec<CreatedInvoice>),
    Blocked(BlockReason),
    /// Installment-based client with nothing due this month
    NothingDue,
}

/// Generates monthly invoices for an organisation's active clients
pub struct BillingScheduler {
    clients: Arc<dyn ClientRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    installments: Arc<dyn InstallmentRepository>,
    notifier: Arc<dyn NotificationPort>,
}

impl BillingScheduler {
    pub fn new(
        clients: Arc<dyn ClientRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        installments: Arc<dyn InstallmentRepository>,
        notifier: Arc<dyn NotificationPort>,
    ) -> Self {
        Self {
            clients,
            invoices,
            installments,
            notifier,
        }
    }

    /// Runs generation for every active client of the organisation
    ///
    /// Per-client failures are collected into the report; only an unknown
    /// organisation aborts the run.
    pub async fn run_for_org(
        &self,
        org_id: OrgId,
        now: DateTime<Utc>,
        tz: Timezone,
    ) -> Result<ScheduleRunReport, AutomationError> {
        if !self.clients.org_exists(org_id).await? {
            return Err(AutomationError::UnknownOrganization(org_id));
        }

        let today = tz.local_date(now);
        let month = DateRange::month_of(today);
        let mut report = ScheduleRunReport::default();

        for client in self.clients.find_active_by_org(org_id).await? {
            match self.generate_for_client(&client, today, month, now).await {
                Ok(ClientOutcome::Created(created)) => {
                    tracing::info!(
                        client_id = %client.id,
                        invoices = created.len(),
                        "generated invoices for client"
                    );
                    report.success.extend(created);
                }
                Ok(ClientOutcome::Blocked(reason)) => {
                    tracing::debug!(client_id = %client.id, %reason, "client blocked");
                    report.blocked.push(BlockedClient {
                        client_id: client.id,
                        reason,
                    });
                }
                Ok(ClientOutcome::NothingDue) => {}
                Err(err) => {
                    tracing::warn!(client_id = %client.id, error = %err, "generation failed");
                    report.errors.push(ClientFailure {
                        client_id: client.id,
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Applies the blocking rules, then generates for one client
    async fn generate_for_client(
        &self,
        client: &Client,
        today: NaiveDate,
        month: DateRange,
        now: DateTime<Utc>,
    ) -> Result<ClientOutcome, AutomationError> {
        if client.contract_not_started(today) {
            return Ok(ClientOutcome::Blocked(BlockReason::ContractNotStarted));
        }
        if client.contract_ended(today) {
            return Ok(ClientOutcome::Blocked(BlockReason::ContractEnded));
        }
        if self
            .invoices
            .exists_for_client_in(client.org_id, client.id, month)
            .await?
        {
            return Ok(ClientOutcome::Blocked(BlockReason::MonthlyAlreadyGenerated));
        }

        match client.billing_mode {
            BillingMode::Installments => {
                self.generate_installments(client, today, month, now).await
            }
            BillingMode::Monthly => self.generate_monthly(client, today).await,
        }
    }

    /// One invoice per installment due this month
    async fn generate_installments(
        &self,
        client: &Client,
        today: NaiveDate,
        month: DateRange,
        now: DateTime<Utc>,
    ) -> Result<ClientOutcome, AutomationError> {
        let due = self.installments.find_due_in(client.id, month).await?;
        if due.is_empty() {
            return Ok(ClientOutcome::NothingDue);
        }

        let mut created = Vec::with_capacity(due.len());
        for mut installment in due {
            if installment.status == InstallmentStatus::Pending && installment.mark_late(now)? {
                self.installments.update(&installment).await?;
            }

            let description = format!("Installment {}", installment.number);
            let item = InvoiceItem::new(description, Decimal::ONE, installment.amount)?;
            let invoice = self
                .issue_invoice(
                    client,
                    today,
                    installment.due_date,
                    vec![item],
                    InvoiceOrigin::ScheduledInstallment,
                )
                .await?;

            created.push(CreatedInvoice {
                client_id: client.id,
                invoice_id: invoice.id(),
                amount: invoice.total(),
            });
        }
        Ok(ClientOutcome::Created(created))
    }

    /// One invoice at the contract value, dated to the payment day
    async fn generate_monthly(
        &self,
        client: &Client,
        today: NaiveDate,
    ) -> Result<ClientOutcome, AutomationError> {
        if client.contract_value.is_zero() {
            // No contract value configured; nothing to bill
            return Ok(ClientOutcome::NothingDue);
        }

        let due_date = clamped_day_of_month(today.year(), today.month(), client.payment_day)
            .map_err(BillingError::from)?;
        let item = InvoiceItem::new("Monthly contract fee", Decimal::ONE, client.contract_value)?;
        let invoice = self
            .issue_invoice(
                client,
                today,
                due_date,
                vec![item],
                InvoiceOrigin::ScheduledMonthly,
            )
            .await?;

        Ok(ClientOutcome::Created(vec![CreatedInvoice {
            client_id: client.id,
            invoice_id: invoice.id(),
            amount: invoice.total(),
        }]))
    }

    /// Creates, persists, and announces one open invoice
    ///
    /// An invoice generated after its due day is issued on the due day
    /// itself, keeping the issue/due ordering invariant.
    async fn issue_invoice(
        &self,
        client: &Client,
        today: NaiveDate,
        due_date: NaiveDate,
        items: Vec<InvoiceItem>,
        origin: InvoiceOrigin,
    ) -> Result<Invoice, AutomationError> {
        let currency = client.contract_value.currency();
        let issue_date = today.min(due_date);
        let invoice = Invoice::create(
            client.org_id,
            client.id,
            generate_invoice_number(),
            issue_date,
            due_date,
            items,
            Money::zero(currency),
            Money::zero(currency),
        )?
        .with_origin(origin);
        self.invoices.create(&invoice).await?;

        dispatch_fire_and_forget(
            self.notifier.as_ref(),
            Notification {
                org_id: client.org_id,
                kind: NotificationKind::InvoiceCreated,
                title: format!("Invoice {} issued", invoice.number()),
                message: format!(
                    "Invoice {} for {} issued to {}, due {}",
                    invoice.number(),
                    invoice.total(),
                    client.name,
                    invoice.due_date()
                ),
                link: format!("/finance/invoices/{}", invoice.id()),
                client_id: Some(client.id),
                priority: NotificationPriority::Normal,
            },
        )
        .await;

        Ok(invoice)
    }
}
