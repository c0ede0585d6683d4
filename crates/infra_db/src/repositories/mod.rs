//! Repository implementations
//!
//! PostgreSQL adapters for the billing ports. Rows are mapped into plain
//! row structs first, then restored into domain entities so the entity
//! layer re-validates cross-field invariants on the way out of storage.

pub mod client;
pub mod installment;
pub mod invoice;
pub mod ledger;
pub mod payment;
pub mod recurring;

pub use client::PgClientRepository;
pub use installment::PgInstallmentRepository;
pub use invoice::PgInvoiceRepository;
pub use ledger::PgLedgerRepository;
pub use payment::PgPaymentRepository;
pub use recurring::PgRecurringExpenseRepository;

use core_kernel::{Currency, Money};
use rust_decimal::Decimal;

use crate::error::DatabaseError;

/// Parses a stored ISO 4217 code
pub(crate) fn parse_currency(code: &str) -> Result<Currency, DatabaseError> {
    code.parse()
        .map_err(|_| DatabaseError::CorruptRow(format!("Unknown currency code: {}", code)))
}

/// Rebuilds a monetary value from its stored amount and currency columns
pub(crate) fn money_from(amount: Decimal, code: &str) -> Result<Money, DatabaseError> {
    let currency = parse_currency(code)?;
    Money::new(amount, currency)
        .map_err(|err| DatabaseError::CorruptRow(format!("Stored amount invalid: {}", err)))
}
