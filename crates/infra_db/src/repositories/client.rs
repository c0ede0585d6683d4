//! Client repository implementation
//!
//! Also owns the organisation lookups batch runs depend on: top-level
//! org validation and the documented first-organisation fallback for
//! unresolved gateway events.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{ClientId, DomainPort, OrgId, PortError};
use domain_billing::{
    BillingMode, Client, ClientPaymentStatus, ClientRepository,
};

use crate::error::DatabaseError;
use crate::repositories::money_from;

const SELECT_COLUMNS: &str = "id, org_id, name, active, contract_start, contract_end, \
     contract_value, currency, payment_day, billing_mode, payment_status, created_at, updated_at";

/// PostgreSQL adapter for the client port
#[derive(Debug, Clone)]
pub struct PgClientRepository {
    pool: PgPool,
}

impl PgClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    id: Uuid,
    org_id: Uuid,
    name: String,
    active: bool,
    contract_start: Option<NaiveDate>,
    contract_end: Option<NaiveDate>,
    contract_value: Decimal,
    currency: String,
    payment_day: i32,
    billing_mode: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn billing_mode_to_str(mode: BillingMode) -> &'static str {
    match mode {
        BillingMode::Monthly => "monthly",
        BillingMode::Installments => "installments",
    }
}

fn billing_mode_from_str(mode: &str) -> Result<BillingMode, DatabaseError> {
    match mode {
        "monthly" => Ok(BillingMode::Monthly),
        "installments" => Ok(BillingMode::Installments),
        other => Err(DatabaseError::CorruptRow(format!(
            "Unknown billing mode: {}",
            other
        ))),
    }
}

fn payment_status_to_str(status: ClientPaymentStatus) -> &'static str {
    match status {
        ClientPaymentStatus::Paid => "paid",
        ClientPaymentStatus::Pending => "pending",
        ClientPaymentStatus::Overdue => "overdue",
    }
}

fn payment_status_from_str(status: &str) -> Result<ClientPaymentStatus, DatabaseError> {
    match status {
        "paid" => Ok(ClientPaymentStatus::Paid),
        "pending" => Ok(ClientPaymentStatus::Pending),
        "overdue" => Ok(ClientPaymentStatus::Overdue),
        other => Err(DatabaseError::CorruptRow(format!(
            "Unknown client payment status: {}",
            other
        ))),
    }
}

impl ClientRow {
    fn into_client(self) -> Result<Client, DatabaseError> {
        Ok(Client {
            id: ClientId::from(self.id),
            org_id: OrgId::from(self.org_id),
            name: self.name,
            active: self.active,
            contract_start: self.contract_start,
            contract_end: self.contract_end,
            contract_value: money_from(self.contract_value, &self.currency)?,
            payment_day: self.payment_day as u32,
            billing_mode: billing_mode_from_str(&self.billing_mode)?,
            payment_status: payment_status_from_str(&self.payment_status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl DomainPort for PgClientRepository {}

#[async_trait]
impl ClientRepository for PgClientRepository {
    async fn create(&self, client: &Client) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO clients (id, org_id, name, active, contract_start, contract_end, \
             contract_value, currency, payment_day, billing_mode, payment_status, created_at, \
             updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(Uuid::from(client.id))
        .bind(Uuid::from(client.org_id))
        .bind(&client.name)
        .bind(client.active)
        .bind(client.contract_start)
        .bind(client.contract_end)
        .bind(client.contract_value.amount())
        .bind(client.contract_value.currency().code())
        .bind(client.payment_day as i32)
        .bind(billing_mode_to_str(client.billing_mode))
        .bind(payment_status_to_str(client.payment_status))
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn update(&self, client: &Client) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE clients SET name = $3, active = $4, contract_start = $5, contract_end = $6, \
             contract_value = $7, currency = $8, payment_day = $9, billing_mode = $10, \
             payment_status = $11, updated_at = $12 \
             WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(client.id))
        .bind(Uuid::from(client.org_id))
        .bind(&client.name)
        .bind(client.active)
        .bind(client.contract_start)
        .bind(client.contract_end)
        .bind(client.contract_value.amount())
        .bind(client.contract_value.currency().code())
        .bind(client.payment_day as i32)
        .bind(billing_mode_to_str(client.billing_mode))
        .bind(payment_status_to_str(client.payment_status))
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Client", client.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, org_id: OrgId, id: ClientId) -> Result<Client, PortError> {
        let row: Option<ClientRow> = sqlx::query_as(&format!(
            "SELECT {} FROM clients WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => Ok(row.into_client()?),
            None => Err(PortError::not_found("Client", id)),
        }
    }

    async fn find_active_by_org(&self, org_id: OrgId) -> Result<Vec<Client>, PortError> {
        let rows: Vec<ClientRow> = sqlx::query_as(&format!(
            "SELECT {} FROM clients WHERE org_id = $1 AND active AND deleted_at IS NULL \
             ORDER BY name",
            SELECT_COLUMNS
        ))
        .bind(Uuid::from(org_id))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let mut clients = Vec::with_capacity(rows.len());
        for row in rows {
            clients.push(row.into_client()?);
        }
        Ok(clients)
    }

    async fn org_of(&self, client_id: ClientId) -> Result<Option<OrgId>, PortError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT org_id FROM clients WHERE id = $1 AND deleted_at IS NULL")
                .bind(Uuid::from(client_id))
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;
        Ok(row.map(|(org_id,)| OrgId::from(org_id)))
    }

    async fn org_exists(&self, org_id: OrgId) -> Result<bool, PortError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM organizations WHERE id = $1)")
                .bind(Uuid::from(org_id))
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;
        Ok(exists)
    }

    async fn first_org(&self) -> Result<Option<OrgId>, PortError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM organizations ORDER BY created_at LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;
        Ok(row.map(|(id,)| OrgId::from(id)))
    }

    async fn soft_delete(&self, org_id: OrgId, id: ClientId) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE clients SET deleted_at = NOW() \
             WHERE id = $1 AND org_id = $2 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(org_id))
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Client", id));
        }
        Ok(())
    }
}
