//! Behavioural tests for the automation services
//!
//! Everything runs against the in-memory port adapters, at a fixed
//! instant (2025-03-15 12:00 UTC), so outcomes are deterministic.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

use core_kernel::{BillingCycle, Currency, DomainPort, Money, OrgId, PortError};
use domain_billing::{
    reconcile_revenue, ClientRepository, Installment, InstallmentRepository, InstallmentStatus,
    InvoiceQuery, InvoiceRepository, InvoiceStatus, LedgerEntryRepository, PaymentMethod,
    PaymentRepository, PaymentStatus, RecurringExpenseRepository,
};
use domain_automation::{
    AutomationError, BillingScheduler, BlockReason, ClientStatusSync,
    FinancialAutomationOrchestrator, GatewayPaymentEvent, Notification, NotificationPort,
    OverdueAutomator, PaymentIngestService, RecurringExpenseMaterializer,
};
use test_utils::{
    ClientBuilder, IdFixtures, InMemoryClientRepository, InMemoryInstallmentRepository,
    InMemoryInvoiceRepository, InMemoryLedgerRepository, InMemoryPaymentRepository,
    InMemoryRecurringExpenseRepository, InvoiceBuilder, RecurringExpenseBuilder, TemporalFixtures,
};

fn brl(amount: rust_decimal::Decimal) -> Money {
    Money::new(amount, Currency::BRL).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Records dispatched notifications; optionally fails every dispatch
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl DomainPort for RecordingNotifier {}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), PortError> {
        self.sent.lock().unwrap().push(notification);
        if self.fail {
            return Err(PortError::connection("notifier unavailable"));
        }
        Ok(())
    }
}

/// One wired-up set of in-memory stores and services
struct Harness {
    org_id: OrgId,
    clients: Arc<InMemoryClientRepository>,
    invoices: Arc<InMemoryInvoiceRepository>,
    installments: Arc<InMemoryInstallmentRepository>,
    ledger: Arc<InMemoryLedgerRepository>,
    payments: Arc<InMemoryPaymentRepository>,
    expenses: Arc<InMemoryRecurringExpenseRepository>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new() -> Self {
        let harness = Self::empty();
        harness.clients.register_org(harness.org_id);
        harness
    }

    /// No organisation registered at all
    fn empty() -> Self {
        Self {
            org_id: IdFixtures::org_id(),
            clients: Arc::new(InMemoryClientRepository::new()),
            invoices: Arc::new(InMemoryInvoiceRepository::new()),
            installments: Arc::new(InMemoryInstallmentRepository::new()),
            ledger: Arc::new(InMemoryLedgerRepository::new()),
            payments: Arc::new(InMemoryPaymentRepository::new()),
            expenses: Arc::new(InMemoryRecurringExpenseRepository::new()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    fn scheduler(&self) -> BillingScheduler {
        BillingScheduler::new(
            self.clients.clone(),
            self.invoices.clone(),
            self.installments.clone(),
            self.notifier.clone(),
        )
    }

    fn materializer(&self) -> RecurringExpenseMaterializer {
        RecurringExpenseMaterializer::new(self.expenses.clone(), self.ledger.clone())
    }

    fn overdue(&self) -> OverdueAutomator {
        OverdueAutomator::new(self.invoices.clone())
    }

    fn status_sync(&self) -> ClientStatusSync {
        ClientStatusSync::new(self.clients.clone(), self.invoices.clone())
    }

    fn orchestrator(&self) -> FinancialAutomationOrchestrator {
        FinancialAutomationOrchestrator::new(
            self.clients.clone(),
            self.scheduler(),
            self.overdue(),
            self.status_sync(),
            self.notifier.clone(),
        )
    }

    fn ingest_service(&self) -> PaymentIngestService {
        PaymentIngestService::new(
            self.invoices.clone(),
            self.payments.clone(),
            self.ledger.clone(),
            self.clients.clone(),
            self.notifier.clone(),
        )
    }
}

// ============================================================================
// Billing Scheduler
// ============================================================================

mod scheduler_tests {
    use super::*;

    #[tokio::test]
    async fn monthly_client_gets_one_invoice_dated_to_payment_day() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id)
            .with_payment_day(5)
            .with_contract_value(brl(dec!(3000)))
            .build();
        harness.clients.create(&client).await.unwrap();

        let report = harness
            .scheduler()
            .run_for_org(
                harness.org_id,
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await
            .unwrap();

        assert_eq!(report.success.len(), 1);
        assert!(report.blocked.is_empty());
        assert!(report.errors.is_empty());

        let invoice = harness
            .invoices
            .find_by_id(harness.org_id, report.success[0].invoice_id)
            .await
            .unwrap();
        assert_eq!(invoice.due_date(), date(2025, 3, 5));
        assert_eq!(invoice.total(), brl(dec!(3000)));
        test_utils::assert_open(&invoice);
        test_utils::assert_invoice_invariants(&invoice);
        // Invoice-created notification went out
        assert_eq!(harness.notifier.count(), 1);
    }

    #[tokio::test]
    async fn payment_day_clamps_to_end_of_february() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id).with_payment_day(31).build();
        harness.clients.create(&client).await.unwrap();

        let feb_run = chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2025, 2, 10, 9, 0, 0)
            .unwrap();
        let report = harness
            .scheduler()
            .run_for_org(harness.org_id, feb_run, TemporalFixtures::utc())
            .await
            .unwrap();

        let invoice = harness
            .invoices
            .find_by_id(harness.org_id, report.success[0].invoice_id)
            .await
            .unwrap();
        assert_eq!(invoice.due_date(), date(2025, 2, 28));
    }

    #[tokio::test]
    async fn contract_ended_yesterday_blocks_with_named_reason() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id)
            .with_contract_start(date(2024, 1, 1))
            .with_contract_end(TemporalFixtures::yesterday())
            .build();
        harness.clients.create(&client).await.unwrap();

        let report = harness
            .scheduler()
            .run_for_org(
                harness.org_id,
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await
            .unwrap();

        assert!(report.success.is_empty());
        assert_eq!(report.blocked.len(), 1);
        assert_eq!(report.blocked[0].reason, BlockReason::ContractEnded);
    }

    #[tokio::test]
    async fn future_contract_blocks_with_named_reason() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id)
            .with_contract_start(date(2025, 4, 1))
            .build();
        harness.clients.create(&client).await.unwrap();

        let report = harness
            .scheduler()
            .run_for_org(
                harness.org_id,
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await
            .unwrap();

        assert_eq!(report.blocked.len(), 1);
        assert_eq!(report.blocked[0].reason, BlockReason::ContractNotStarted);
    }

    #[tokio::test]
    async fn second_run_in_same_month_is_blocked() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id).build();
        harness.clients.create(&client).await.unwrap();

        let scheduler = harness.scheduler();
        let now = TemporalFixtures::run_instant();
        let tz = TemporalFixtures::utc();

        let first = scheduler.run_for_org(harness.org_id, now, tz).await.unwrap();
        assert_eq!(first.success.len(), 1);

        let second = scheduler.run_for_org(harness.org_id, now, tz).await.unwrap();
        assert!(second.success.is_empty());
        assert_eq!(second.blocked.len(), 1);
        assert_eq!(
            second.blocked[0].reason,
            BlockReason::MonthlyAlreadyGenerated
        );
        // Still exactly one invoice in the store
        assert_eq!(harness.invoices.len(), 1);
    }

    #[tokio::test]
    async fn installment_client_gets_one_invoice_per_due_installment() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id).installment_based().build();
        harness.clients.create(&client).await.unwrap();

        // One due this month (already past), one next month
        let plan = vec![
            Installment::new(client.id, 1, brl(dec!(500)), date(2025, 3, 10)).unwrap(),
            Installment::new(client.id, 2, brl(dec!(500)), date(2025, 4, 10)).unwrap(),
        ];
        harness.installments.create_batch(&plan).await.unwrap();

        let report = harness
            .scheduler()
            .run_for_org(
                harness.org_id,
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await
            .unwrap();

        assert_eq!(report.success.len(), 1);
        assert_eq!(report.success[0].amount, brl(dec!(500)));

        // The past-due pending installment was transitioned to late
        let stored = harness.installments.find_by_id(plan[0].id).await.unwrap();
        assert_eq!(stored.status, InstallmentStatus::Late);
        let upcoming = harness.installments.find_by_id(plan[1].id).await.unwrap();
        assert_eq!(upcoming.status, InstallmentStatus::Pending);
    }

    #[tokio::test]
    async fn installment_client_with_nothing_due_produces_no_entry() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id).installment_based().build();
        harness.clients.create(&client).await.unwrap();

        let plan =
            vec![Installment::new(client.id, 1, brl(dec!(500)), date(2025, 6, 10)).unwrap()];
        harness.installments.create_batch(&plan).await.unwrap();

        let report = harness
            .scheduler()
            .run_for_org(
                harness.org_id,
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await
            .unwrap();

        // A skip, not a block and not an error
        assert!(report.success.is_empty());
        assert!(report.blocked.is_empty());
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn unknown_org_aborts_the_run() {
        let harness = Harness::new();
        let result = harness
            .scheduler()
            .run_for_org(
                IdFixtures::org_id(),
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await;

        assert!(matches!(
            result,
            Err(AutomationError::UnknownOrganization(_))
        ));
    }

    #[tokio::test]
    async fn notifier_outage_does_not_fail_generation() {
        let mut harness = Harness::new();
        harness.notifier = Arc::new(RecordingNotifier::failing());
        let client = ClientBuilder::new(harness.org_id).build();
        harness.clients.create(&client).await.unwrap();

        let report = harness
            .scheduler()
            .run_for_org(
                harness.org_id,
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await
            .unwrap();

        assert_eq!(report.success.len(), 1);
        assert!(report.errors.is_empty());
        // The dispatch was attempted and its failure swallowed
        assert_eq!(harness.notifier.count(), 1);
    }
}

// ============================================================================
// Recurring Expense Materializer
// ============================================================================

mod materializer_tests {
    use super::*;

    #[tokio::test]
    async fn materializes_once_then_skips_the_cycle() {
        let harness = Harness::new();
        let definition = RecurringExpenseBuilder::new(harness.org_id).on_day(31).build();
        harness.expenses.create(&definition).await.unwrap();

        let materializer = harness.materializer();
        let now = TemporalFixtures::run_instant();
        let tz = TemporalFixtures::utc();

        let first = materializer
            .run_for_org(harness.org_id, BillingCycle::Monthly, now, tz)
            .await
            .unwrap();
        assert_eq!(first.success.len(), 1);
        assert!(first.skipped.is_empty());
        // Day 31 clamps to March 31, then to the run date
        assert_eq!(first.success[0].date, TemporalFixtures::run_date());

        let second = materializer
            .run_for_org(harness.org_id, BillingCycle::Monthly, now, tz)
            .await
            .unwrap();
        assert!(second.success.is_empty());
        assert_eq!(second.skipped.len(), 1);
        assert_eq!(second.skipped[0].reason, "already materialized this cycle");
        assert_eq!(harness.ledger.len(), 1);
    }

    #[tokio::test]
    async fn monthly_run_ignores_annual_definitions() {
        let harness = Harness::new();
        let annual = RecurringExpenseBuilder::new(harness.org_id)
            .with_name("Accounting retainer")
            .annual()
            .build();
        harness.expenses.create(&annual).await.unwrap();

        let report = harness
            .materializer()
            .run_for_org(
                harness.org_id,
                BillingCycle::Monthly,
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await
            .unwrap();

        assert!(report.success.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn annual_cycle_window_spans_the_year() {
        let harness = Harness::new();
        let annual = RecurringExpenseBuilder::new(harness.org_id).annual().build();
        harness.expenses.create(&annual).await.unwrap();

        let materializer = harness.materializer();
        let tz = TemporalFixtures::utc();

        let march = TemporalFixtures::run_instant();
        let first = materializer
            .run_for_org(harness.org_id, BillingCycle::Annual, march, tz)
            .await
            .unwrap();
        assert_eq!(first.success.len(), 1);

        // A later run in the same year is still the same cycle
        let november = chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2025, 11, 2, 8, 0, 0)
            .unwrap();
        let second = materializer
            .run_for_org(harness.org_id, BillingCycle::Annual, november, tz)
            .await
            .unwrap();
        assert_eq!(second.skipped.len(), 1);
    }

    #[tokio::test]
    async fn inactive_definitions_are_not_listed() {
        let harness = Harness::new();
        let inactive = RecurringExpenseBuilder::new(harness.org_id).inactive().build();
        harness.expenses.create(&inactive).await.unwrap();

        let report = harness
            .materializer()
            .run_for_org(
                harness.org_id,
                BillingCycle::Monthly,
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await
            .unwrap();

        assert!(report.success.is_empty());
        assert!(report.skipped.is_empty());
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn manual_path_materializes_one_definition() {
        let harness = Harness::new();
        let definition = RecurringExpenseBuilder::new(harness.org_id).on_day(2).build();
        harness.expenses.create(&definition).await.unwrap();

        let materializer = harness.materializer();
        let now = TemporalFixtures::run_instant();
        let tz = TemporalFixtures::utc();

        let outcome = materializer
            .materialize_one(harness.org_id, definition.id, now, tz)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            domain_automation::MaterializeOutcome::Created(_)
        ));

        // The cycle guard also protects the manual path
        let outcome = materializer
            .materialize_one(harness.org_id, definition.id, now, tz)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            domain_automation::MaterializeOutcome::Skipped(_)
        ));
    }
}

// ============================================================================
// Overdue Automator and Status Sync
// ============================================================================

mod overdue_tests {
    use super::*;

    #[tokio::test]
    async fn only_past_due_open_invoices_transition() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id).build();
        harness.clients.create(&client).await.unwrap();

        let past_due_open = InvoiceBuilder::new(harness.org_id, client.id)
            .with_number("INV-PAST")
            .with_dates(date(2025, 2, 1), date(2025, 3, 1))
            .build();
        let future_open = InvoiceBuilder::new(harness.org_id, client.id)
            .with_number("INV-FUTURE")
            .with_dates(date(2025, 3, 1), date(2025, 4, 10))
            .build();
        let mut past_due_paid = InvoiceBuilder::new(harness.org_id, client.id)
            .with_number("INV-PAID")
            .with_dates(date(2025, 2, 1), date(2025, 3, 1))
            .build();
        past_due_paid.pay(None).unwrap();
        let mut past_due_cancelled = InvoiceBuilder::new(harness.org_id, client.id)
            .with_number("INV-CANC")
            .with_dates(date(2025, 2, 1), date(2025, 3, 1))
            .build();
        past_due_cancelled.cancel().unwrap();

        for invoice in [&past_due_open, &future_open, &past_due_paid, &past_due_cancelled] {
            harness.invoices.create(invoice).await.unwrap();
        }

        let report = harness
            .overdue()
            .run_for_org(harness.org_id, TemporalFixtures::run_instant())
            .await
            .unwrap();
        assert_eq!(report.count, 1);

        // Monotonicity: no open invoice is past due any more
        let all = harness
            .invoices
            .find_by_org(harness.org_id, InvoiceQuery::default())
            .await
            .unwrap();
        for invoice in &all {
            if invoice.status() == InvoiceStatus::Open {
                assert!(invoice.due_date() >= TemporalFixtures::run_date());
            }
        }
        // Settled invoices are untouched
        let paid = harness
            .invoices
            .find_by_id(harness.org_id, past_due_paid.id())
            .await
            .unwrap();
        assert_eq!(paid.status(), InvoiceStatus::Paid);
        let cancelled = harness
            .invoices
            .find_by_id(harness.org_id, past_due_cancelled.id())
            .await
            .unwrap();
        assert_eq!(cancelled.status(), InvoiceStatus::Cancelled);

        // A second run finds nothing left
        let again = harness
            .overdue()
            .run_for_org(harness.org_id, TemporalFixtures::run_instant())
            .await
            .unwrap();
        assert_eq!(again.count, 0);
    }

    #[tokio::test]
    async fn status_sync_recomputes_aggregate() {
        let harness = Harness::new();
        let mut client = ClientBuilder::new(harness.org_id).build();
        harness.clients.create(&client).await.unwrap();

        let mut overdue_invoice = InvoiceBuilder::new(harness.org_id, client.id)
            .with_dates(date(2025, 2, 1), date(2025, 3, 1))
            .build();
        overdue_invoice
            .mark_overdue(TemporalFixtures::run_instant())
            .unwrap();
        harness.invoices.create(&overdue_invoice).await.unwrap();

        let sync = harness.status_sync();
        let changed = sync.sync_client(harness.org_id, &mut client).await.unwrap();
        assert!(changed);
        assert_eq!(
            client.payment_status,
            domain_billing::ClientPaymentStatus::Overdue
        );

        // Pay the invoice; the aggregate drops to Paid
        harness
            .invoices
            .mark_paid(
                harness.org_id,
                overdue_invoice.id(),
                TemporalFixtures::run_instant(),
            )
            .await
            .unwrap();
        let changed = sync.sync_client(harness.org_id, &mut client).await.unwrap();
        assert!(changed);
        assert_eq!(
            client.payment_status,
            domain_billing::ClientPaymentStatus::Paid
        );
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

mod orchestrator_tests {
    use super::*;

    #[tokio::test]
    async fn full_run_composes_all_steps() {
        let harness = Harness::new();
        // Payment day 5 is already past at the run instant, so the fresh
        // invoice goes overdue in the same pass
        let client = ClientBuilder::new(harness.org_id).with_payment_day(5).build();
        harness.clients.create(&client).await.unwrap();

        let report = harness
            .orchestrator()
            .run_for_org(
                harness.org_id,
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.created, 1);
        // One overdue transition plus one client status change
        assert_eq!(report.updated, 2);
        assert_eq!(report.errors, 0);
        assert!(!report.details.is_empty());

        let stored = harness
            .clients
            .find_by_id(harness.org_id, client.id)
            .await
            .unwrap();
        assert_eq!(
            stored.payment_status,
            domain_billing::ClientPaymentStatus::Overdue
        );
        // One invoice-created and one payment-overdue notification
        assert_eq!(harness.notifier.count(), 2);
    }

    #[tokio::test]
    async fn unknown_org_fails_fast() {
        let harness = Harness::new();
        let result = harness
            .orchestrator()
            .run_for_org(
                IdFixtures::org_id(),
                TemporalFixtures::run_instant(),
                TemporalFixtures::utc(),
            )
            .await;

        assert!(matches!(
            result,
            Err(AutomationError::UnknownOrganization(_))
        ));
    }
}

// ============================================================================
// Revenue Reporting
// ============================================================================

mod reporting_tests {
    use super::*;
    use domain_billing::{EntryType, LedgerEntry, Payment, RevenueReportService};

    #[tokio::test]
    async fn revenue_report_reads_both_stores_and_dedups() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id).build();
        harness.clients.create(&client).await.unwrap();
        let invoice = InvoiceBuilder::new(harness.org_id, client.id).build();
        harness.invoices.create(&invoice).await.unwrap();

        // Bookkeeping recorded the invoice income by hand
        let entry = LedgerEntry::new(
            harness.org_id,
            EntryType::Income,
            LedgerEntry::SUBTYPE_MANUAL,
            invoice.total(),
            TemporalFixtures::run_date(),
        )
        .unwrap()
        .with_invoice(invoice.id());
        harness.ledger.create(&entry).await.unwrap();

        // The gateway recorded the same receipt as a payment, plus an
        // unrelated ad-hoc one
        let mut linked =
            Payment::create_for_invoice(&invoice, invoice.total(), PaymentMethod::Pix).unwrap();
        linked.set_paid_at(TemporalFixtures::run_instant());
        harness.payments.create(&linked).await.unwrap();

        let mut adhoc =
            Payment::create(harness.org_id, None, brl(dec!(500)), PaymentMethod::Cash).unwrap();
        adhoc.set_paid_at(TemporalFixtures::run_instant());
        harness.payments.create(&adhoc).await.unwrap();

        let service =
            RevenueReportService::new(harness.ledger.clone(), harness.payments.clone());
        let window = core_kernel::DateRange::month_of(TemporalFixtures::run_date());
        let revenue = service
            .revenue_for_window(harness.org_id, window, TemporalFixtures::utc(), Currency::BRL)
            .await
            .unwrap();

        assert_eq!(revenue.total, invoice.total() + brl(dec!(500)));
        assert_eq!(revenue.recognized, 2);
        assert_eq!(revenue.deduplicated, 1);
    }
}

// ============================================================================
// Gateway Ingestion
// ============================================================================

mod gateway_tests {
    use super::*;

    fn event_for(invoice: &domain_billing::Invoice) -> GatewayPaymentEvent {
        GatewayPaymentEvent {
            invoice_id: Some(invoice.id()),
            client_id: None,
            amount: invoice.total(),
            paid_at: TemporalFixtures::run_instant(),
            method: PaymentMethod::Pix,
            reference: Some("gw-evt-1".to_string()),
            signature_verified: true,
        }
    }

    #[tokio::test]
    async fn unverified_signature_is_rejected() {
        let harness = Harness::new();
        let mut event = event_for(
            &InvoiceBuilder::new(harness.org_id, IdFixtures::client_id()).build(),
        );
        event.signature_verified = false;

        let result = harness.ingest_service().ingest(event).await;
        assert!(matches!(
            result,
            Err(AutomationError::Billing(
                domain_billing::BillingError::Validation(_)
            ))
        ));
        assert!(harness.payments.is_empty());
    }

    #[tokio::test]
    async fn linked_event_pays_invoice_and_writes_ledger_entry() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id).build();
        harness.clients.create(&client).await.unwrap();
        let invoice = InvoiceBuilder::new(harness.org_id, client.id).build();
        harness.invoices.create(&invoice).await.unwrap();

        let payment = harness
            .ingest_service()
            .ingest(event_for(&invoice))
            .await
            .unwrap();

        assert_eq!(payment.status(), PaymentStatus::Verified);
        assert_eq!(payment.invoice_id(), Some(invoice.id()));
        assert_eq!(payment.reference(), Some("gw-evt-1"));

        let stored = harness
            .invoices
            .find_by_id(harness.org_id, invoice.id())
            .await
            .unwrap();
        assert_eq!(stored.status(), InvoiceStatus::Paid);

        let entries = harness.ledger.all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].invoice_id, Some(invoice.id()));
    }

    #[tokio::test]
    async fn duplicate_webhook_delivery_is_tolerated() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id).build();
        harness.clients.create(&client).await.unwrap();
        let invoice = InvoiceBuilder::new(harness.org_id, client.id).build();
        harness.invoices.create(&invoice).await.unwrap();

        let service = harness.ingest_service();
        service.ingest(event_for(&invoice)).await.unwrap();
        // Second delivery: the payment is recorded, the settle step is a
        // tolerated conflict, and no second ledger entry appears
        service.ingest(event_for(&invoice)).await.unwrap();

        assert_eq!(harness.payments.len(), 2);
        assert_eq!(harness.ledger.len(), 1);

        // Reconciliation still counts the receipt once
        let window = core_kernel::DateRange::month_of(TemporalFixtures::run_date());
        let period = window.to_period(&TemporalFixtures::utc());
        let entries = harness
            .ledger
            .find_income_in_period(harness.org_id, period)
            .await
            .unwrap();
        let payments = harness
            .payments
            .find_in_period(harness.org_id, period)
            .await
            .unwrap();
        let revenue = reconcile_revenue(&entries, &payments, Currency::BRL).unwrap();
        assert_eq!(revenue.total, invoice.total());
        assert_eq!(revenue.deduplicated, 2);
    }

    #[tokio::test]
    async fn client_linked_event_resolves_tenant() {
        let harness = Harness::new();
        let client = ClientBuilder::new(harness.org_id).build();
        harness.clients.create(&client).await.unwrap();

        let event = GatewayPaymentEvent {
            invoice_id: None,
            client_id: Some(client.id),
            amount: brl(dec!(150)),
            paid_at: TemporalFixtures::run_instant(),
            method: PaymentMethod::Cash,
            reference: None,
            signature_verified: true,
        };

        let payment = harness.ingest_service().ingest(event).await.unwrap();
        assert_eq!(payment.org_id(), harness.org_id);
        assert_eq!(payment.client_id(), Some(client.id));
        // No invoice link, no ledger entry
        assert!(harness.ledger.is_empty());
    }

    #[tokio::test]
    async fn unresolved_event_falls_back_to_first_org() {
        let harness = Harness::new();

        let event = GatewayPaymentEvent {
            invoice_id: None,
            client_id: None,
            amount: brl(dec!(90)),
            paid_at: TemporalFixtures::run_instant(),
            method: PaymentMethod::Other,
            reference: None,
            signature_verified: true,
        };

        let payment = harness.ingest_service().ingest(event).await.unwrap();
        assert_eq!(payment.org_id(), harness.org_id);
    }

    #[tokio::test]
    async fn unresolved_event_with_no_orgs_fails() {
        let harness = Harness::empty();

        let event = GatewayPaymentEvent {
            invoice_id: None,
            client_id: None,
            amount: brl(dec!(90)),
            paid_at: TemporalFixtures::run_instant(),
            method: PaymentMethod::Other,
            reference: None,
            signature_verified: true,
        };

        let result = harness.ingest_service().ingest(event).await;
        assert!(matches!(
            result,
            Err(AutomationError::Billing(
                domain_billing::BillingError::NotFound(_)
            ))
        ));
    }
}
