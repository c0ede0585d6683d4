//! Recurring expense definition repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{BillingCycle, ClientId, DomainPort, OrgId, PortError, RecurringExpenseId};
use domain_billing::{RecurringExpenseDefinition, RecurringExpenseRepository};

use crate::error::DatabaseError;
use crate::repositories::money_from;

const SELECT_COLUMNS: &str = "id, org_id, name, amount, currency, cycle, day_of_month, active, \
     client_id, created_at, updated_at";

/// PostgreSQL adapter for the recurring expense port
#[derive(Debug, Clone)]
pub struct PgRecurringExpenseRepository {
    pool: PgPool,
}

impl PgRecurringExpenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecurringExpenseRow {
    id: Uuid,
    org_id: Uuid,
    name: String,
    amount: Decimal,
    currency: String,
    cycle: String,
    day_of_month: Option<i32>,
    active: bool,
    client_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn cycle_to_str(cycle: BillingCycle) -> &'static str {
    match cycle {
        BillingCycle::Monthly => "monthly",
        BillingCycle::Annual => "annual",
    }
}

fn cycle_from_str(cycle: &str) -> Result<BillingCycle, DatabaseError> {
    match cycle {
        "monthly" => Ok(BillingCycle::Monthly),
        "annual" => Ok(BillingCycle::Annual),
        other => Err(DatabaseError::CorruptRow(format!(
            "Unknown billing cycle: {}",
            other
        ))),
    }
}

impl RecurringExpenseRow {
    fn into_definition(self) -> Result<RecurringExpenseDefinition, DatabaseError> {
        Ok(RecurringExpenseDefinition {
            id: RecurringExpenseId::from(self.id),
            org_id: OrgId::from(self.org_id),
            name: self.name,
            amount: money_from(self.amount, &self.currency)?,
            cycle: cycle_from_str(&self.cycle)?,
            day_of_month: self.day_of_month.map(|day| day as u32),
            active: self.active,
            client_id: self.client_id.map(ClientId::from),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl DomainPort for PgRecurringExpenseRepository {}

#[async_trait]
impl RecurringExpenseRepository for PgRecurringExpenseRepository {
    async fn create(&self, definition: &RecurringExpenseDefinition) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO recurring_expenses (id, org_id, name, amount, currency, cycle, \
             day_of_month, active, client_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(Uuid::from(definition.id))
        .bind(Uuid::from(definition.org_id))
        .bind(&definition.name)
        .bind(definition.amount.amount())
        .bind(definition.amount.currency().code())
        .bind(cycle_to_str(definition.cycle))
        .bind(definition.day_of_month.map(|day| day as i32))
        .bind(definition.active)
        .bind(definition.client_id.map(Uuid::from))
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn update(&self, definition: &RecurringExpenseDefinition) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE recurring_expenses SET name = $3, amount = $4, currency = $5, cycle = $6, \
             day_of_month = $7, active = $8, client_id = $9, updated_at = $10 \
             WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(definition.id))
        .bind(Uuid::from(definition.org_id))
        .bind(&definition.name)
        .bind(definition.amount.amount())
        .bind(definition.amount.currency().code())
        .bind(cycle_to_str(definition.cycle))
        .bind(definition.day_of_month.map(|day| day as i32))
        .bind(definition.active)
        .bind(definition.client_id.map(Uuid::from))
        .bind(definition.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("RecurringExpense", definition.id));
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        org_id: OrgId,
        id: RecurringExpenseId,
    ) -> Result<RecurringExpenseDefinition, PortError> {
        let row: Option<RecurringExpenseRow> = sqlx::query_as(&format!(
            "SELECT {} FROM recurring_expenses WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => Ok(row.into_definition()?),
            None => Err(PortError::not_found("RecurringExpense", id)),
        }
    }

    async fn find_by_org(
        &self,
        org_id: OrgId,
    ) -> Result<Vec<RecurringExpenseDefinition>, PortError> {
        let rows: Vec<RecurringExpenseRow> = sqlx::query_as(&format!(
            "SELECT {} FROM recurring_expenses WHERE org_id = $1 AND deleted_at IS NULL \
             ORDER BY name",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(org_id))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            definitions.push(row.into_definition()?);
        }
        Ok(definitions)
    }

    async fn find_active_by_cycle(
        &self,
        org_id: OrgId,
        cycle: BillingCycle,
    ) -> Result<Vec<RecurringExpenseDefinition>, PortError> {
        let rows: Vec<RecurringExpenseRow> = sqlx::query_as(&format!(
            "SELECT {} FROM recurring_expenses \
             WHERE org_id = $1 AND cycle = $2 AND active AND deleted_at IS NULL \
             ORDER BY name",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(org_id))
        .bind(cycle_to_str(cycle))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            definitions.push(row.into_definition()?);
        }
        Ok(definitions)
    }

    async fn soft_delete(&self, org_id: OrgId, id: RecurringExpenseId) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE recurring_expenses SET deleted_at = NOW() \
             WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("RecurringExpense", id));
        }
        Ok(())
    }
}
