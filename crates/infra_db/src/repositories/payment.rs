//! Payment repository implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{ClientId, DomainPort, InvoiceId, OrgId, PaymentId, Period, PortError};
use domain_billing::{
    Payment, PaymentMethod, PaymentQuery, PaymentRepository, PaymentSnapshot, PaymentStatus,
};

use crate::error::DatabaseError;
use crate::repositories::money_from;

const SELECT_COLUMNS: &str = "id, org_id, invoice_id, client_id, amount, currency, status, \
     method, due_date, paid_at, processed_at, verified_at, refunded_at, refunded_amount, \
     failure_reason, reference, notes, created_at, updated_at";

/// PostgreSQL adapter for the payment port
#[derive(Debug, Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    org_id: Uuid,
    invoice_id: Option<Uuid>,
    client_id: Option<Uuid>,
    amount: Decimal,
    currency: String,
    status: String,
    method: String,
    due_date: Option<NaiveDate>,
    paid_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    verified_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    refunded_amount: Option<Decimal>,
    failure_reason: Option<String>,
    reference: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn status_to_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Processed => "processed",
        PaymentStatus::Verified => "verified",
        PaymentStatus::Late => "late",
        PaymentStatus::Failed => "failed",
        PaymentStatus::Refunded => "refunded",
    }
}

fn status_from_str(status: &str) -> Result<PaymentStatus, DatabaseError> {
    match status {
        "pending" => Ok(PaymentStatus::Pending),
        "processed" => Ok(PaymentStatus::Processed),
        "verified" => Ok(PaymentStatus::Verified),
        "late" => Ok(PaymentStatus::Late),
        "failed" => Ok(PaymentStatus::Failed),
        "refunded" => Ok(PaymentStatus::Refunded),
        other => Err(DatabaseError::CorruptRow(format!(
            "Unknown payment status: {}",
            other
        ))),
    }
}

fn method_to_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Pix => "pix",
        PaymentMethod::BankTransfer => "bank_transfer",
        PaymentMethod::CreditCard => "credit_card",
        PaymentMethod::DebitCard => "debit_card",
        PaymentMethod::Boleto => "boleto",
        PaymentMethod::Cash => "cash",
        PaymentMethod::Other => "other",
    }
}

fn method_from_str(method: &str) -> Result<PaymentMethod, DatabaseError> {
    match method {
        "pix" => Ok(PaymentMethod::Pix),
        "bank_transfer" => Ok(PaymentMethod::BankTransfer),
        "credit_card" => Ok(PaymentMethod::CreditCard),
        "debit_card" => Ok(PaymentMethod::DebitCard),
        "boleto" => Ok(PaymentMethod::Boleto),
        "cash" => Ok(PaymentMethod::Cash),
        "other" => Ok(PaymentMethod::Other),
        other => Err(DatabaseError::CorruptRow(format!(
            "Unknown payment method: {}",
            other
        ))),
    }
}

impl PaymentRow {
    fn into_payment(self) -> Result<Payment, DatabaseError> {
        let refunded_amount = self
            .refunded_amount
            .map(|amount| money_from(amount, &self.currency))
            .transpose()?;
        let snapshot = PaymentSnapshot {
            id: PaymentId::from(self.id),
            org_id: OrgId::from(self.org_id),
            invoice_id: self.invoice_id.map(InvoiceId::from),
            client_id: self.client_id.map(ClientId::from),
            amount: money_from(self.amount, &self.currency)?,
            status: status_from_str(&self.status)?,
            method: method_from_str(&self.method)?,
            due_date: self.due_date,
            paid_at: self.paid_at,
            processed_at: self.processed_at,
            verified_at: self.verified_at,
            refunded_at: self.refunded_at,
            refunded_amount,
            failure_reason: self.failure_reason,
            reference: self.reference,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Payment::restore(snapshot).map_err(|err| DatabaseError::CorruptRow(err.to_string()))
    }
}

impl DomainPort for PgPaymentRepository {}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn create(&self, payment: &Payment) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO payments (id, org_id, invoice_id, client_id, amount, currency, status, \
             method, due_date, paid_at, processed_at, verified_at, refunded_at, refunded_amount, \
             failure_reason, reference, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19)",
        )
        .bind(Uuid::from(payment.id()))
        .bind(Uuid::from(payment.org_id()))
        .bind(payment.invoice_id().map(Uuid::from))
        .bind(payment.client_id().map(Uuid::from))
        .bind(payment.amount().amount())
        .bind(payment.amount().currency().code())
        .bind(status_to_str(payment.status()))
        .bind(method_to_str(payment.method()))
        .bind(payment.due_date())
        .bind(payment.paid_at())
        .bind(payment.processed_at())
        .bind(payment.verified_at())
        .bind(payment.refunded_at())
        .bind(payment.refunded_amount().map(|m| m.amount()))
        .bind(payment.failure_reason())
        .bind(payment.reference())
        .bind(payment.notes())
        .bind(payment.created_at())
        .bind(payment.updated_at())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE payments SET status = $3, method = $4, due_date = $5, paid_at = $6, \
             processed_at = $7, verified_at = $8, refunded_at = $9, refunded_amount = $10, \
             failure_reason = $11, reference = $12, notes = $13, updated_at = $14 \
             WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(payment.id()))
        .bind(Uuid::from(payment.org_id()))
        .bind(status_to_str(payment.status()))
        .bind(method_to_str(payment.method()))
        .bind(payment.due_date())
        .bind(payment.paid_at())
        .bind(payment.processed_at())
        .bind(payment.verified_at())
        .bind(payment.refunded_at())
        .bind(payment.refunded_amount().map(|m| m.amount()))
        .bind(payment.failure_reason())
        .bind(payment.reference())
        .bind(payment.notes())
        .bind(payment.updated_at())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Payment", payment.id()));
        }
        Ok(())
    }

    async fn find_by_id(&self, org_id: OrgId, id: PaymentId) -> Result<Payment, PortError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => Ok(row.into_payment()?),
            None => Err(PortError::not_found("Payment", id)),
        }
    }

    async fn find_by_org(
        &self,
        org_id: OrgId,
        query: PaymentQuery,
    ) -> Result<Vec<Payment>, PortError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM payments WHERE deleted_at IS NULL AND org_id = ",
            SELECT_COLUMNS
        ));
        builder.push_bind(Uuid::from(org_id));

        if let Some(client_id) = query.client_id {
            builder.push(" AND client_id = ");
            builder.push_bind(Uuid::from(client_id));
        }
        if let Some(invoice_id) = query.invoice_id {
            builder.push(" AND invoice_id = ");
            builder.push_bind(Uuid::from(invoice_id));
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status_to_str(status));
        }
        builder.push(" ORDER BY created_at DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset as i64);
        }

        let rows: Vec<PaymentRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let mut payments = Vec::with_capacity(rows.len());
        for row in rows {
            payments.push(row.into_payment()?);
        }
        Ok(payments)
    }

    async fn find_in_period(
        &self,
        org_id: OrgId,
        period: Period,
    ) -> Result<Vec<Payment>, PortError> {
        // A payment's date is when it was paid, falling back to when it
        // was recorded.
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments \
             WHERE org_id = $1 AND deleted_at IS NULL \
             AND COALESCE(paid_at, created_at) BETWEEN $2 AND $3 \
             ORDER BY created_at",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(org_id))
        .bind(period.start)
        .bind(period.end)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let mut payments = Vec::with_capacity(rows.len());
        for row in rows {
            payments.push(row.into_payment()?);
        }
        Ok(payments)
    }

    async fn soft_delete(&self, org_id: OrgId, id: PaymentId) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE payments SET deleted_at = NOW() \
             WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Payment", id));
        }
        Ok(())
    }
}
