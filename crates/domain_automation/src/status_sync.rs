//! Client payment-status sync
//!
//! Recomputes a client's aggregate payment status from its invoice set:
//! overdue if any invoice is overdue, else pending if any is open, else
//! paid. Runs after the overdue automator so freshly transitioned
//! invoices are reflected.

use std::sync::Arc;

use core_kernel::OrgId;
use domain_billing::{
    Client, ClientPaymentStatus, ClientRepository, InvoiceQuery, InvoiceRepository, InvoiceStatus,
};

use crate::error::AutomationError;

/// Recomputes aggregate client payment statuses
pub struct ClientStatusSync {
    clients: Arc<dyn ClientRepository>,
    invoices: Arc<dyn InvoiceRepository>,
}

impl ClientStatusSync {
    pub fn new(clients: Arc<dyn ClientRepository>, invoices: Arc<dyn InvoiceRepository>) -> Self {
        Self { clients, invoices }
    }

    /// Syncs one client; returns true when the stored status changed
    pub async fn sync_client(
        &self,
        org_id: OrgId,
        client: &mut Client,
    ) -> Result<bool, AutomationError> {
        let invoices = self
            .invoices
            .find_by_org(org_id, InvoiceQuery::by_client(client.id))
            .await?;

        let mut any_overdue = false;
        let mut any_open = false;
        for invoice in &invoices {
            match invoice.status() {
                InvoiceStatus::Overdue => any_overdue = true,
                InvoiceStatus::Open => any_open = true,
                InvoiceStatus::Paid | InvoiceStatus::Cancelled => {}
            }
        }

        let status = if any_overdue {
            ClientPaymentStatus::Overdue
        } else if any_open {
            ClientPaymentStatus::Pending
        } else {
            ClientPaymentStatus::Paid
        };

        if client.set_payment_status(status) {
            self.clients.update(client).await?;
            tracing::debug!(client_id = %client.id, ?status, "client payment status updated");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
