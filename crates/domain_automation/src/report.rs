//! Batch-run reports
//!
//! Every automation run returns a structured report instead of throwing on
//! per-item failures: one client's broken contract data must never stop
//! the rest of the organisation from being billed.

use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, InvoiceId, LedgerEntryId, Money, RecurringExpenseId};

/// A named reason invoice generation was skipped for a client this run
///
/// Blocks are expected outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockReason {
    /// The contract start date is in the future
    ContractNotStarted,
    /// The contract end date has passed
    ContractEnded,
    /// An invoice for this client already exists this calendar month
    MonthlyAlreadyGenerated,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlockReason::ContractNotStarted => "CONTRACT_NOT_STARTED",
            BlockReason::ContractEnded => "CONTRACT_ENDED",
            BlockReason::MonthlyAlreadyGenerated => "MONTHLY_ALREADY_GENERATED",
        };
        write!(f, "{}", name)
    }
}

/// One invoice generated for a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedInvoice {
    pub client_id: ClientId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
}

/// One client blocked from generation, with the rule that fired
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedClient {
    pub client_id: ClientId,
    pub reason: BlockReason,
}

/// One client whose generation failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFailure {
    pub client_id: ClientId,
    pub message: String,
}

/// Result of one billing scheduler run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleRunReport {
    pub success: Vec<CreatedInvoice>,
    pub blocked: Vec<BlockedClient>,
    pub errors: Vec<ClientFailure>,
}

/// One ledger entry materialized from a recurring definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializedExpense {
    pub definition_id: RecurringExpenseId,
    pub entry_id: LedgerEntryId,
    pub date: chrono::NaiveDate,
}

/// One definition skipped by the idempotency guard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedDefinition {
    pub definition_id: RecurringExpenseId,
    pub reason: String,
}

/// One definition whose materialization failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionFailure {
    pub definition_id: RecurringExpenseId,
    pub message: String,
}

/// Result of one recurring-expense materializer run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializeRunReport {
    pub success: Vec<MaterializedExpense>,
    pub skipped: Vec<SkippedDefinition>,
    pub errors: Vec<DefinitionFailure>,
}

/// Result of one overdue transition run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OverdueReport {
    /// Invoices transitioned Open -> Overdue by the bulk update
    pub count: u64,
}

/// Aggregate result of a full orchestrated automation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationRunReport {
    /// Clients examined
    pub processed: usize,
    /// Invoices generated
    pub created: usize,
    /// Rows changed by overdue transitions and status syncs
    pub updated: usize,
    /// Per-item failures collected across all steps
    pub errors: usize,
    /// Human-readable outcome lines, in processing order
    pub details: Vec<String>,
}
