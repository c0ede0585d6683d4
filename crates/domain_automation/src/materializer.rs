//! Recurring expense materializer
//!
//! Turns recurring-expense definitions into concrete ledger entries, one
//! per definition per cycle. An entry already inside the cycle window
//! means the definition was materialized by an earlier run and is
//! reported as skipped, never duplicated.
//!
//! Like the scheduler's month guard, the existence check here is
//! read-then-write; the storage layer backstops it with a uniqueness
//! constraint on the (definition, cycle window) key.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use core_kernel::{BillingCycle, OrgId, RecurringExpenseId, Timezone};
use domain_billing::{
    EntryType, LedgerEntry, LedgerEntryRepository, RecurringExpenseDefinition,
    RecurringExpenseRepository,
};

use crate::error::AutomationError;
use crate::report::{
    DefinitionFailure, MaterializeRunReport, MaterializedExpense, SkippedDefinition,
};

/// Outcome of materializing one definition
pub enum MaterializeOutcome {
    Created(MaterializedExpense),
    Skipped(SkippedDefinition),
}

/// Materializes recurring expense definitions into ledger entries
pub struct RecurringExpenseMaterializer {
    definitions: Arc<dyn RecurringExpenseRepository>,
    ledger: Arc<dyn LedgerEntryRepository>,
}

impl RecurringExpenseMaterializer {
    pub fn new(
        definitions: Arc<dyn RecurringExpenseRepository>,
        ledger: Arc<dyn LedgerEntryRepository>,
    ) -> Self {
        Self { definitions, ledger }
    }

    /// Materializes every active definition on the given cadence
    ///
    /// Per-definition failures are collected; the batch always finishes.
    pub async fn run_for_org(
        &self,
        org_id: OrgId,
        cycle: BillingCycle,
        now: DateTime<Utc>,
        tz: Timezone,
    ) -> Result<MaterializeRunReport, AutomationError> {
        let mut report = MaterializeRunReport::default();

        for definition in self.definitions.find_active_by_cycle(org_id, cycle).await? {
            match self.materialize(&definition, now, tz).await {
                Ok(MaterializeOutcome::Created(item)) => report.success.push(item),
                Ok(MaterializeOutcome::Skipped(item)) => report.skipped.push(item),
                Err(err) => {
                    tracing::warn!(
                        definition_id = %definition.id,
                        error = %err,
                        "materialization failed"
                    );
                    report.errors.push(DefinitionFailure {
                        definition_id: definition.id,
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Manual single-definition path, for on-demand triggering
    ///
    /// Still idempotency-guarded: a cycle that already has its entry is
    /// reported as skipped.
    pub async fn materialize_one(
        &self,
        org_id: OrgId,
        definition_id: RecurringExpenseId,
        now: DateTime<Utc>,
        tz: Timezone,
    ) -> Result<MaterializeOutcome, AutomationError> {
        let definition = self.definitions.find_by_id(org_id, definition_id).await?;
        self.materialize(&definition, now, tz).await
    }

    /// Checks the cycle window, then writes one expense entry
    async fn materialize(
        &self,
        definition: &RecurringExpenseDefinition,
        now: DateTime<Utc>,
        tz: Timezone,
    ) -> Result<MaterializeOutcome, AutomationError> {
        let today = tz.local_date(now);
        let window = definition.cycle.window_containing(today);

        if self
            .ledger
            .exists_for_cost_item_in(definition.org_id, definition.id, window)
            .await?
        {
            return Ok(MaterializeOutcome::Skipped(SkippedDefinition {
                definition_id: definition.id,
                reason: "already materialized this cycle".to_string(),
            }));
        }

        let date = definition
            .entry_date_for(today)
            .map_err(domain_billing::BillingError::from)?;
        let mut entry = LedgerEntry::new(
            definition.org_id,
            EntryType::Expense,
            LedgerEntry::SUBTYPE_RECURRING_EXPENSE,
            definition.amount,
            date,
        )?
        .with_cost_item(definition.id)
        .with_metadata(serde_json::json!({
            "definition_name": definition.name,
            "cycle": definition.cycle.to_string(),
        }));
        if let Some(client_id) = definition.client_id {
            entry = entry.with_client(client_id);
        }

        self.ledger.create(&entry).await?;
        tracing::info!(
            definition_id = %definition.id,
            entry_id = %entry.id,
            %date,
            "materialized recurring expense"
        );

        Ok(MaterializeOutcome::Created(MaterializedExpense {
            definition_id: definition.id,
            entry_id: entry.id,
            date,
        }))
    }
}
