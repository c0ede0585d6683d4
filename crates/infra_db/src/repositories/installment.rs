//! Installment repository implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{ClientId, DateRange, DomainPort, InstallmentId, PortError};
use domain_billing::{Installment, InstallmentRepository, InstallmentStatus};

use crate::error::DatabaseError;
use crate::repositories::money_from;

const SELECT_COLUMNS: &str =
    "id, client_id, number, amount, currency, due_date, status, created_at, updated_at";

/// PostgreSQL adapter for the installment port
#[derive(Debug, Clone)]
pub struct PgInstallmentRepository {
    pool: PgPool,
}

impl PgInstallmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InstallmentRow {
    id: Uuid,
    client_id: Uuid,
    number: i32,
    amount: Decimal,
    currency: String,
    due_date: NaiveDate,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn status_to_str(status: InstallmentStatus) -> &'static str {
    match status {
        InstallmentStatus::Pending => "pending",
        InstallmentStatus::Paid => "paid",
        InstallmentStatus::Late => "late",
    }
}

fn status_from_str(status: &str) -> Result<InstallmentStatus, DatabaseError> {
    match status {
        "pending" => Ok(InstallmentStatus::Pending),
        "paid" => Ok(InstallmentStatus::Paid),
        "late" => Ok(InstallmentStatus::Late),
        other => Err(DatabaseError::CorruptRow(format!(
            "Unknown installment status: {}",
            other
        ))),
    }
}

impl InstallmentRow {
    fn into_installment(self) -> Result<Installment, DatabaseError> {
        Ok(Installment {
            id: InstallmentId::from(self.id),
            client_id: ClientId::from(self.client_id),
            number: self.number as u32,
            amount: money_from(self.amount, &self.currency)?,
            due_date: self.due_date,
            status: status_from_str(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl DomainPort for PgInstallmentRepository {}

#[async_trait]
impl InstallmentRepository for PgInstallmentRepository {
    async fn create(&self, installment: &Installment) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO installments (id, client_id, number, amount, currency, due_date, \
             status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Uuid::from(installment.id))
        .bind(Uuid::from(installment.client_id))
        .bind(installment.number as i32)
        .bind(installment.amount.amount())
        .bind(installment.amount.currency().code())
        .bind(installment.due_date)
        .bind(status_to_str(installment.status))
        .bind(installment.created_at)
        .bind(installment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn create_batch(&self, installments: &[Installment]) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;
        for installment in installments {
            sqlx::query(
                "INSERT INTO installments (id, client_id, number, amount, currency, due_date, \
                 status, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(Uuid::from(installment.id))
            .bind(Uuid::from(installment.client_id))
            .bind(installment.number as i32)
            .bind(installment.amount.amount())
            .bind(installment.amount.currency().code())
            .bind(installment.due_date)
            .bind(status_to_str(installment.status))
            .bind(installment.created_at)
            .bind(installment.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        }
        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn update(&self, installment: &Installment) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE installments SET amount = $2, currency = $3, due_date = $4, status = $5, \
             updated_at = $6 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(installment.id))
        .bind(installment.amount.amount())
        .bind(installment.amount.currency().code())
        .bind(installment.due_date)
        .bind(status_to_str(installment.status))
        .bind(installment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Installment", installment.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: InstallmentId) -> Result<Installment, PortError> {
        let row: Option<InstallmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM installments WHERE id = $1 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => Ok(row.into_installment()?),
            None => Err(PortError::not_found("Installment", id)),
        }
    }

    async fn find_by_client(&self, client_id: ClientId) -> Result<Vec<Installment>, PortError> {
        let rows: Vec<InstallmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM installments WHERE client_id = $1 AND deleted_at IS NULL \
             ORDER BY number",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(client_id))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let mut installments = Vec::with_capacity(rows.len());
        for row in rows {
            installments.push(row.into_installment()?);
        }
        Ok(installments)
    }

    async fn find_due_in(
        &self,
        client_id: ClientId,
        window: DateRange,
    ) -> Result<Vec<Installment>, PortError> {
        let rows: Vec<InstallmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM installments \
             WHERE client_id = $1 AND due_date BETWEEN $2 AND $3 AND deleted_at IS NULL \
             ORDER BY number",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(client_id))
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let mut installments = Vec::with_capacity(rows.len());
        for row in rows {
            installments.push(row.into_installment()?);
        }
        Ok(installments)
    }

    async fn soft_delete(&self, id: InstallmentId) -> Result<(), PortError> {
        let result =
            sqlx::query("UPDATE installments SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
                .bind(Uuid::from(id))
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Installment", id));
        }
        Ok(())
    }
}
