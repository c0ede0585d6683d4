//! Financial Automation - scheduled billing, materialization, and overdue handling
//!
//! The services in this crate drive the billing domain on a cycle:
//!
//! - [`BillingScheduler`] generates the month's invoices per client,
//!   applying the contract blocking rules and installment plans.
//! - [`RecurringExpenseMaterializer`] turns recurring-expense definitions
//!   into concrete ledger entries, once per cycle.
//! - [`OverdueAutomator`] bulk-transitions past-due open invoices.
//! - [`ClientStatusSync`] recomputes aggregate client payment statuses.
//! - [`FinancialAutomationOrchestrator`] composes the above into the run
//!   a cron trigger invokes.
//! - [`PaymentIngestService`] records normalized gateway payment events.
//!
//! All services consume the repository ports defined in `domain_billing`
//! and report per-item outcomes instead of aborting batches.

pub mod error;
pub mod gateway;
pub mod materializer;
pub mod notify;
pub mod orchestrator;
pub mod overdue;
pub mod report;
pub mod scheduler;
pub mod status_sync;

pub use error::AutomationError;
pub use gateway::{GatewayPaymentEvent, PaymentIngestService};
pub use materializer::{MaterializeOutcome, RecurringExpenseMaterializer};
pub use notify::{
    dispatch_fire_and_forget, Notification, NotificationKind, NotificationPort,
    NotificationPriority,
};
pub use orchestrator::FinancialAutomationOrchestrator;
pub use overdue::OverdueAutomator;
pub use report::{
    AutomationRunReport, BlockReason, BlockedClient, ClientFailure, CreatedInvoice,
    MaterializeRunReport, OverdueReport, ScheduleRunReport,
};
pub use scheduler::BillingScheduler;
pub use status_sync::ClientStatusSync;
