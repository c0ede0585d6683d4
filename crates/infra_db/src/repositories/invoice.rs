//! Invoice repository implementation
//!
//! The lifecycle transitions (`mark_paid`, `cancel`, the overdue batch)
//! are single conditional UPDATEs: the status precondition sits in the
//! WHERE clause, so two concurrent callers cannot both succeed against
//! the same invoice in incompatible ways.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{ClientId, DateRange, DomainPort, InvoiceId, OrgId, PortError};
use domain_billing::{
    Invoice, InvoiceItem, InvoiceOrigin, InvoiceQuery, InvoiceRepository, InvoiceSnapshot,
    InvoiceStatus,
};

use crate::error::DatabaseError;
use crate::repositories::money_from;

const SELECT_COLUMNS: &str = "id, org_id, client_id, number, issue_date, due_date, items, \
     subtotal, discount, tax, total, currency, status, origin, paid_at, notes, \
     created_at, updated_at";

/// PostgreSQL adapter for the invoice port
#[derive(Debug, Clone)]
pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    org_id: Uuid,
    client_id: Uuid,
    number: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    items: serde_json::Value,
    subtotal: Decimal,
    discount: Decimal,
    tax: Decimal,
    total: Decimal,
    currency: String,
    status: String,
    origin: String,
    paid_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn status_to_str(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Open => "open",
        InvoiceStatus::Paid => "paid",
        InvoiceStatus::Overdue => "overdue",
        InvoiceStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(status: &str) -> Result<InvoiceStatus, DatabaseError> {
    match status {
        "open" => Ok(InvoiceStatus::Open),
        "paid" => Ok(InvoiceStatus::Paid),
        "overdue" => Ok(InvoiceStatus::Overdue),
        "cancelled" => Ok(InvoiceStatus::Cancelled),
        other => Err(DatabaseError::CorruptRow(format!(
            "Unknown invoice status: {}",
            other
        ))),
    }
}

fn origin_to_str(origin: InvoiceOrigin) -> &'static str {
    match origin {
        InvoiceOrigin::Manual => "manual",
        InvoiceOrigin::ScheduledMonthly => "scheduled_monthly",
        InvoiceOrigin::ScheduledInstallment => "scheduled_installment",
    }
}

fn origin_from_str(origin: &str) -> Result<InvoiceOrigin, DatabaseError> {
    match origin {
        "manual" => Ok(InvoiceOrigin::Manual),
        "scheduled_monthly" => Ok(InvoiceOrigin::ScheduledMonthly),
        "scheduled_installment" => Ok(InvoiceOrigin::ScheduledInstallment),
        other => Err(DatabaseError::CorruptRow(format!(
            "Unknown invoice origin: {}",
            other
        ))),
    }
}

impl InvoiceRow {
    fn into_invoice(self) -> Result<Invoice, DatabaseError> {
        let items: Vec<InvoiceItem> = serde_json::from_value(self.items)
            .map_err(|err| DatabaseError::SerializationError(err.to_string()))?;
        let snapshot = InvoiceSnapshot {
            id: InvoiceId::from(self.id),
            org_id: OrgId::from(self.org_id),
            client_id: ClientId::from(self.client_id),
            number: self.number,
            issue_date: self.issue_date,
            due_date: self.due_date,
            items,
            subtotal: money_from(self.subtotal, &self.currency)?,
            discount: money_from(self.discount, &self.currency)?,
            tax: money_from(self.tax, &self.currency)?,
            total: money_from(self.total, &self.currency)?,
            status: status_from_str(&self.status)?,
            origin: origin_from_str(&self.origin)?,
            paid_at: self.paid_at,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Invoice::restore(snapshot).map_err(|err| DatabaseError::CorruptRow(err.to_string()))
    }
}

impl DomainPort for PgInvoiceRepository {}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    async fn create(&self, invoice: &Invoice) -> Result<(), PortError> {
        let items = serde_json::to_value(invoice.items())
            .map_err(|err| DatabaseError::SerializationError(err.to_string()))?;
        sqlx::query(
            "INSERT INTO invoices (id, org_id, client_id, number, issue_date, due_date, items, \
             subtotal, discount, tax, total, currency, status, origin, paid_at, notes, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(Uuid::from(invoice.id()))
        .bind(Uuid::from(invoice.org_id()))
        .bind(Uuid::from(invoice.client_id()))
        .bind(invoice.number())
        .bind(invoice.issue_date())
        .bind(invoice.due_date())
        .bind(items)
        .bind(invoice.subtotal().amount())
        .bind(invoice.discount().amount())
        .bind(invoice.tax().amount())
        .bind(invoice.total().amount())
        .bind(invoice.currency().code())
        .bind(status_to_str(invoice.status()))
        .bind(origin_to_str(invoice.origin()))
        .bind(invoice.paid_at())
        .bind(invoice.notes())
        .bind(invoice.created_at())
        .bind(invoice.updated_at())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn update(&self, invoice: &Invoice) -> Result<(), PortError> {
        let items = serde_json::to_value(invoice.items())
            .map_err(|err| DatabaseError::SerializationError(err.to_string()))?;
        let result = sqlx::query(
            "UPDATE invoices SET number = $3, issue_date = $4, due_date = $5, items = $6, \
             subtotal = $7, discount = $8, tax = $9, total = $10, currency = $11, status = $12, \
             origin = $13, paid_at = $14, notes = $15, updated_at = $16 \
             WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(invoice.id()))
        .bind(Uuid::from(invoice.org_id()))
        .bind(invoice.number())
        .bind(invoice.issue_date())
        .bind(invoice.due_date())
        .bind(items)
        .bind(invoice.subtotal().amount())
        .bind(invoice.discount().amount())
        .bind(invoice.tax().amount())
        .bind(invoice.total().amount())
        .bind(invoice.currency().code())
        .bind(status_to_str(invoice.status()))
        .bind(origin_to_str(invoice.origin()))
        .bind(invoice.paid_at())
        .bind(invoice.notes())
        .bind(invoice.updated_at())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Invoice", invoice.id()));
        }
        Ok(())
    }

    async fn find_by_id(&self, org_id: OrgId, id: InvoiceId) -> Result<Invoice, PortError> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => Ok(row.into_invoice()?),
            None => Err(PortError::not_found("Invoice", id)),
        }
    }

    async fn find_by_org(
        &self,
        org_id: OrgId,
        query: InvoiceQuery,
    ) -> Result<Vec<Invoice>, PortError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM invoices WHERE deleted_at IS NULL AND org_id = ",
            SELECT_COLUMNS
        ));
        builder.push_bind(Uuid::from(org_id));

        if let Some(client_id) = query.client_id {
            builder.push(" AND client_id = ");
            builder.push_bind(Uuid::from(client_id));
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status_to_str(status));
        }
        if let Some(due_before) = query.due_before {
            builder.push(" AND due_date < ");
            builder.push_bind(due_before);
        }
        if let Some(window) = query.issued_in {
            builder.push(" AND issue_date BETWEEN ");
            builder.push_bind(window.start);
            builder.push(" AND ");
            builder.push_bind(window.end);
        }
        builder.push(" ORDER BY issue_date DESC, created_at DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset as i64);
        }

        let rows: Vec<InvoiceRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let mut invoices = Vec::with_capacity(rows.len());
        for row in rows {
            invoices.push(row.into_invoice()?);
        }
        Ok(invoices)
    }

    async fn exists_for_client_in(
        &self,
        org_id: OrgId,
        client_id: ClientId,
        window: DateRange,
    ) -> Result<bool, PortError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM invoices \
             WHERE org_id = $1 AND client_id = $2 \
             AND issue_date BETWEEN $3 AND $4 \
             AND status <> 'cancelled' AND deleted_at IS NULL)",
        )
        .bind(Uuid::from(org_id))
        .bind(Uuid::from(client_id))
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(exists)
    }

    async fn org_of(&self, id: InvoiceId) -> Result<Option<OrgId>, PortError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT org_id FROM invoices WHERE id = $1 AND deleted_at IS NULL")
                .bind(Uuid::from(id))
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;
        Ok(row.map(|(org_id,)| OrgId::from(org_id)))
    }

    async fn mark_paid(
        &self,
        org_id: OrgId,
        id: InvoiceId,
        paid_at: DateTime<Utc>,
    ) -> Result<Invoice, PortError> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "UPDATE invoices SET status = 'paid', paid_at = $3, updated_at = NOW() \
             WHERE id = $1 AND org_id = $2 AND status IN ('open', 'overdue') \
             AND deleted_at IS NULL \
             RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => Ok(row.into_invoice()?),
            None => Err(self.settled_or_missing(org_id, id, "pay").await?),
        }
    }

    async fn cancel(&self, org_id: OrgId, id: InvoiceId) -> Result<Invoice, PortError> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "UPDATE invoices SET status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 AND org_id = $2 AND status IN ('open', 'overdue') \
             AND deleted_at IS NULL \
             RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => Ok(row.into_invoice()?),
            None => Err(self.settled_or_missing(org_id, id, "cancel").await?),
        }
    }

    async fn mark_overdue_batch(
        &self,
        org_id: OrgId,
        now: DateTime<Utc>,
    ) -> Result<u64, PortError> {
        let result = sqlx::query(
            "UPDATE invoices SET status = 'overdue', updated_at = NOW() \
             WHERE org_id = $1 AND status = 'open' AND due_date < $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(org_id))
        .bind(now.date_naive())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn soft_delete(&self, org_id: OrgId, id: InvoiceId) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE invoices SET deleted_at = NOW() \
             WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Invoice", id));
        }
        Ok(())
    }
}

impl PgInvoiceRepository {
    /// Distinguishes a failed state precondition from a missing row
    async fn settled_or_missing(
        &self,
        org_id: OrgId,
        id: InvoiceId,
        operation: &str,
    ) -> Result<PortError, PortError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM invoices WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(match row {
            Some((status,)) => PortError::conflict(format!(
                "Cannot {} invoice {} in status {}",
                operation, id, status
            )),
            None => PortError::not_found("Invoice", id),
        })
    }
}
