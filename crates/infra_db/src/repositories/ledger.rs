//! Ledger entry repository implementation
//!
//! Carries the materializer's idempotency backstop: the partial unique
//! index on (org, cost item, cycle month) turns a lost read-then-write
//! race into a `DuplicateEntry`, surfaced to the caller as a conflict.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{
    ClientId, DateRange, DomainPort, InvoiceId, LedgerEntryId, OrgId, Period, PortError,
    RecurringExpenseId,
};
use domain_billing::{EntryStatus, EntryType, LedgerEntry, LedgerEntryRepository, LedgerQuery};

use crate::error::DatabaseError;
use crate::repositories::money_from;

const SELECT_COLUMNS: &str = "id, org_id, entry_type, subtype, amount, currency, date, status, \
     invoice_id, client_id, cost_item_id, metadata, created_at, updated_at";

/// PostgreSQL adapter for the ledger port
#[derive(Debug, Clone)]
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    org_id: Uuid,
    entry_type: String,
    subtype: String,
    amount: Decimal,
    currency: String,
    date: NaiveDate,
    status: String,
    invoice_id: Option<Uuid>,
    client_id: Option<Uuid>,
    cost_item_id: Option<Uuid>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn entry_type_to_str(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::Income => "income",
        EntryType::Expense => "expense",
    }
}

fn entry_type_from_str(entry_type: &str) -> Result<EntryType, DatabaseError> {
    match entry_type {
        "income" => Ok(EntryType::Income),
        "expense" => Ok(EntryType::Expense),
        other => Err(DatabaseError::CorruptRow(format!(
            "Unknown entry type: {}",
            other
        ))),
    }
}

fn status_to_str(status: EntryStatus) -> &'static str {
    match status {
        EntryStatus::Pending => "pending",
        EntryStatus::Confirmed => "confirmed",
        EntryStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(status: &str) -> Result<EntryStatus, DatabaseError> {
    match status {
        "pending" => Ok(EntryStatus::Pending),
        "confirmed" => Ok(EntryStatus::Confirmed),
        "cancelled" => Ok(EntryStatus::Cancelled),
        other => Err(DatabaseError::CorruptRow(format!(
            "Unknown entry status: {}",
            other
        ))),
    }
}

impl LedgerRow {
    fn into_entry(self) -> Result<LedgerEntry, DatabaseError> {
        Ok(LedgerEntry {
            id: LedgerEntryId::from(self.id),
            org_id: OrgId::from(self.org_id),
            entry_type: entry_type_from_str(&self.entry_type)?,
            subtype: self.subtype,
            amount: money_from(self.amount, &self.currency)?,
            date: self.date,
            status: status_from_str(&self.status)?,
            invoice_id: self.invoice_id.map(InvoiceId::from),
            client_id: self.client_id.map(ClientId::from),
            cost_item_id: self.cost_item_id.map(RecurringExpenseId::from),
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl DomainPort for PgLedgerRepository {}

#[async_trait]
impl LedgerEntryRepository for PgLedgerRepository {
    async fn create(&self, entry: &LedgerEntry) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO ledger_entries (id, org_id, entry_type, subtype, amount, currency, \
             date, status, invoice_id, client_id, cost_item_id, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(Uuid::from(entry.id))
        .bind(Uuid::from(entry.org_id))
        .bind(entry_type_to_str(entry.entry_type))
        .bind(&entry.subtype)
        .bind(entry.amount.amount())
        .bind(entry.amount.currency().code())
        .bind(entry.date)
        .bind(status_to_str(entry.status))
        .bind(entry.invoice_id.map(Uuid::from))
        .bind(entry.client_id.map(Uuid::from))
        .bind(entry.cost_item_id.map(Uuid::from))
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn update(&self, entry: &LedgerEntry) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE ledger_entries SET subtype = $3, amount = $4, currency = $5, date = $6, \
             status = $7, invoice_id = $8, client_id = $9, cost_item_id = $10, metadata = $11, \
             updated_at = $12 \
             WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(entry.id))
        .bind(Uuid::from(entry.org_id))
        .bind(&entry.subtype)
        .bind(entry.amount.amount())
        .bind(entry.amount.currency().code())
        .bind(entry.date)
        .bind(status_to_str(entry.status))
        .bind(entry.invoice_id.map(Uuid::from))
        .bind(entry.client_id.map(Uuid::from))
        .bind(entry.cost_item_id.map(Uuid::from))
        .bind(&entry.metadata)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("LedgerEntry", entry.id));
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        org_id: OrgId,
        id: LedgerEntryId,
    ) -> Result<LedgerEntry, PortError> {
        let row: Option<LedgerRow> = sqlx::query_as(&format!(
            "SELECT {} FROM ledger_entries WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => Ok(row.into_entry()?),
            None => Err(PortError::not_found("LedgerEntry", id)),
        }
    }

    async fn find_by_org(
        &self,
        org_id: OrgId,
        query: LedgerQuery,
    ) -> Result<Vec<LedgerEntry>, PortError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM ledger_entries WHERE deleted_at IS NULL AND org_id = ",
            SELECT_COLUMNS
        ));
        builder.push_bind(Uuid::from(org_id));

        if let Some(entry_type) = query.entry_type {
            builder.push(" AND entry_type = ");
            builder.push_bind(entry_type_to_str(entry_type));
        }
        if let Some(client_id) = query.client_id {
            builder.push(" AND client_id = ");
            builder.push_bind(Uuid::from(client_id));
        }
        if let Some(invoice_id) = query.invoice_id {
            builder.push(" AND invoice_id = ");
            builder.push_bind(Uuid::from(invoice_id));
        }
        if let Some(window) = query.dated_in {
            builder.push(" AND date BETWEEN ");
            builder.push_bind(window.start);
            builder.push(" AND ");
            builder.push_bind(window.end);
        }
        builder.push(" ORDER BY date DESC, created_at DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset as i64);
        }

        let rows: Vec<LedgerRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(row.into_entry()?);
        }
        Ok(entries)
    }

    async fn find_income_in_period(
        &self,
        org_id: OrgId,
        period: Period,
    ) -> Result<Vec<LedgerEntry>, PortError> {
        let window = DateRange::new(period.start.date_naive(), period.end.date_naive())
            .map_err(|err| PortError::validation(err.to_string()))?;
        self.find_by_org(
            org_id,
            LedgerQuery::by_type(EntryType::Income).dated_in(window),
        )
        .await
    }

    async fn exists_for_cost_item_in(
        &self,
        org_id: OrgId,
        cost_item_id: RecurringExpenseId,
        window: DateRange,
    ) -> Result<bool, PortError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM ledger_entries \
             WHERE org_id = $1 AND cost_item_id = $2 \
             AND date BETWEEN $3 AND $4 AND deleted_at IS NULL)",
        )
        .bind(Uuid::from(org_id))
        .bind(Uuid::from(cost_item_id))
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(exists)
    }

    async fn soft_delete(&self, org_id: OrgId, id: LedgerEntryId) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE ledger_entries SET deleted_at = NOW() \
             WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("LedgerEntry", id));
        }
        Ok(())
    }
}
