//! Database Infrastructure - PostgreSQL adapters for the billing ports
//!
//! This crate implements the repository traits from `domain_billing`
//! against PostgreSQL using SQLx. Entities are restored through their
//! domain `restore` paths so stored rows are re-validated on the way out.
//! The SQL migrations carry the uniqueness backstops for the
//! application-level idempotency guards.

pub mod error;
pub mod pool;
pub mod repositories;

pub use error::DatabaseError;
pub use pool::{run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::{
    PgClientRepository, PgInstallmentRepository, PgInvoiceRepository, PgLedgerRepository,
    PgPaymentRepository, PgRecurringExpenseRepository,
};
