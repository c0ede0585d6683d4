//! Billing Domain - invoice and payment lifecycles, ledger, reconciliation
//!
//! This crate is the financial core of the atelier platform:
//!
//! - **Entities** with explicit lifecycle state machines: [`Invoice`],
//!   [`Payment`], [`LedgerEntry`], [`Installment`],
//!   [`RecurringExpenseDefinition`], and the billing view of a [`Client`].
//!   Illegal transitions fail fast with a typed error; nothing mutates
//!   entity state by direct assignment.
//! - **Reconciliation**: [`reconcile_revenue`] merges the two
//!   independently recorded revenue streams (ledger entries and payment
//!   records) into one deduplicated figure, joined on the invoice link.
//! - **Ports**: the repository traits ([`ports`]) the automation services
//!   and reporting code consume; storage adapters live elsewhere.

pub mod client;
pub mod error;
pub mod installment;
pub mod invoice;
pub mod ledger;
pub mod payment;
pub mod ports;
pub mod reconciliation;
pub mod recurring;
pub mod reporting;

pub use client::{BillingMode, Client, ClientPaymentStatus};
pub use error::BillingError;
pub use installment::{Installment, InstallmentStatus};
pub use invoice::{
    generate_invoice_number, Invoice, InvoiceItem, InvoiceOrigin, InvoiceSnapshot, InvoiceStatus,
};
pub use ledger::{EntryStatus, EntryType, LedgerEntry};
pub use payment::{Payment, PaymentMethod, PaymentSnapshot, PaymentStatus};
pub use ports::{
    ClientRepository, InstallmentRepository, InvoiceQuery, InvoiceRepository, LedgerEntryRepository,
    LedgerQuery, PaymentQuery, PaymentRepository, RecurringExpenseRepository,
};
pub use reconciliation::{reconcile_revenue, ReconciledRevenue, RevenueKey};
pub use recurring::RecurringExpenseDefinition;
pub use reporting::RevenueReportService;
