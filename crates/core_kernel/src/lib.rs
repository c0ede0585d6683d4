//! Core Kernel - Foundational types and utilities for the atelier billing core
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic (non-negative by construction)
//! - Temporal types for billing cycles and organisation-local periods
//! - Strongly-typed identifiers
//! - Port-level error types for the hexagonal architecture

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use temporal::{Timezone, Period, DateRange, BillingCycle, TemporalError};
pub use identifiers::{
    OrgId, ClientId, InvoiceId, PaymentId, LedgerEntryId,
    InstallmentId, RecurringExpenseId,
};
pub use ports::{PortError, DomainPort};
