//! Billing domain errors

use core_kernel::money::MoneyError;
use core_kernel::temporal::TemporalError;
use core_kernel::PortError;
use thiserror::Error;

/// Errors that can occur in the billing domain
///
/// The three named variants mirror how callers are expected to react:
/// `Validation` is bad input, `InvalidState` is an illegal lifecycle
/// transition that must be investigated rather than retried, and
/// `NotFound` maps to a 404-equivalent at the boundary.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Bad input: negative amount, empty note, refund over-amount,
    /// missing required field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Illegal lifecycle transition, e.g. paying a cancelled invoice
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Unknown id within the organisation
    #[error("Not found: {0}")]
    NotFound(String),

    /// Money arithmetic failure
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Calendar computation failure
    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),

    /// Persistence failure underneath a domain query service
    #[error(transparent)]
    Port(#[from] PortError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        BillingError::InvalidState(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BillingError::NotFound(message.into())
    }
}
