//! Automation errors

use core_kernel::{OrgId, PortError};
use domain_billing::BillingError;
use thiserror::Error;

/// Errors that abort an automation run
///
/// Per-item failures inside a batch are collected into the run report and
/// never surface here; only malformed top-level input does.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The run was requested for an organisation that does not exist
    #[error("Unknown organisation: {0}")]
    UnknownOrganization(OrgId),

    /// A domain rule rejected the operation
    #[error(transparent)]
    Billing(#[from] BillingError),

    /// The persistence layer failed outside a per-item scope
    #[error(transparent)]
    Port(#[from] PortError),
}
