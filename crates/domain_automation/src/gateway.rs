//! Gateway event ingestion
//!
//! Payment gateways deliver webhooks through adapters that normalize
//! every provider into one event shape. The core's contract with them is
//! that shape plus a signature-verified flag: no write happens unless the
//! adapter vouched for the event's signature.
//!
//! Tenant resolution follows the invoice link, then the client link, then
//! the documented single-tenant fallback: events that resolve to no
//! organisation attach to the first organisation on record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, InvoiceId, Money, OrgId};
use domain_billing::{
    BillingError, ClientRepository, EntryType, Invoice, InvoiceRepository, LedgerEntry,
    LedgerEntryRepository, Payment, PaymentMethod, PaymentRepository,
};

use crate::error::AutomationError;
use crate::notify::{
    dispatch_fire_and_forget, Notification, NotificationKind, NotificationPort,
    NotificationPriority,
};

/// A normalized payment event, regardless of originating gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentEvent {
    pub invoice_id: Option<InvoiceId>,
    pub client_id: Option<ClientId>,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    /// Set by the gateway adapter after verifying the webhook signature;
    /// nothing is written while this is false
    pub signature_verified: bool,
}

/// Records verified gateway payments against the financial stores
pub struct PaymentIngestService {
    invoices: Arc<dyn InvoiceRepository>,
    payments: Arc<dyn PaymentRepository>,
    ledger: Arc<dyn LedgerEntryRepository>,
    clients: Arc<dyn ClientRepository>,
    notifier: Arc<dyn NotificationPort>,
}

impl PaymentIngestService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        payments: Arc<dyn PaymentRepository>,
        ledger: Arc<dyn LedgerEntryRepository>,
        clients: Arc<dyn ClientRepository>,
        notifier: Arc<dyn NotificationPort>,
    ) -> Self {
        Self {
            invoices,
            payments,
            ledger,
            clients,
            notifier,
        }
    }

    /// Records one gateway payment
    ///
    /// The payment arrives verified (the gateway confirmed the charge), so
    /// it is stored as Verified. When the event names an invoice, the
    /// invoice is paid atomically and the income ledger entry written; an
    /// invoice that is already settled keeps the payment record but skips
    /// both steps. The confirmation notification is fire-and-forget.
    pub async fn ingest(&self, event: GatewayPaymentEvent) -> Result<Payment, AutomationError> {
        if !event.signature_verified {
            return Err(AutomationError::Billing(BillingError::validation(
                "Gateway event signature is not verified",
            )));
        }

        let (org_id, invoice) = self.resolve_tenant(&event).await?;

        let mut payment = match &invoice {
            Some(invoice) => Payment::create_for_invoice(invoice, event.amount, event.method)?,
            None => Payment::create(org_id, event.client_id, event.amount, event.method)?,
        };
        payment.process(event.reference.clone())?;
        payment.verify()?;
        payment.set_paid_at(event.paid_at);

        self.payments.create(&payment).await?;

        if let Some(invoice) = &invoice {
            self.settle_invoice(invoice, &event).await?;
        }

        dispatch_fire_and_forget(
            self.notifier.as_ref(),
            Notification {
                org_id,
                kind: NotificationKind::PaymentConfirmed,
                title: "Payment confirmed".to_string(),
                message: match &invoice {
                    Some(invoice) => format!(
                        "Payment of {} confirmed for invoice {}",
                        event.amount,
                        invoice.number()
                    ),
                    None => format!("Payment of {} confirmed", event.amount),
                },
                link: format!("/finance/payments/{}", payment.id()),
                client_id: payment.client_id(),
                priority: NotificationPriority::Normal,
            },
        )
        .await;

        Ok(payment)
    }

    /// Invoice link, then client link, then the first-organisation fallback
    async fn resolve_tenant(
        &self,
        event: &GatewayPaymentEvent,
    ) -> Result<(OrgId, Option<Invoice>), AutomationError> {
        if let Some(invoice_id) = event.invoice_id {
            if let Some(org_id) = self.invoices.org_of(invoice_id).await? {
                let invoice = self.invoices.find_by_id(org_id, invoice_id).await?;
                return Ok((org_id, Some(invoice)));
            }
            return Err(AutomationError::Billing(BillingError::not_found(format!(
                "Invoice {} referenced by gateway event",
                invoice_id
            ))));
        }

        if let Some(client_id) = event.client_id {
            if let Some(org_id) = self.clients.org_of(client_id).await? {
                return Ok((org_id, None));
            }
            return Err(AutomationError::Billing(BillingError::not_found(format!(
                "Client {} referenced by gateway event",
                client_id
            ))));
        }

        // Single-tenant fallback policy: an event naming neither invoice
        // nor client attaches to the first organisation on record.
        match self.clients.first_org().await? {
            Some(org_id) => {
                tracing::warn!(
                    %org_id,
                    "gateway event resolved no tenant; attaching to first organisation"
                );
                Ok((org_id, None))
            }
            None => Err(AutomationError::Billing(BillingError::not_found(
                "No organisation on record for unresolved gateway event",
            ))),
        }
    }

    /// Atomically pays the invoice and writes its income ledger entry
    async fn settle_invoice(
        &self,
        invoice: &Invoice,
        event: &GatewayPaymentEvent,
    ) -> Result<(), AutomationError> {
        match self
            .invoices
            .mark_paid(invoice.org_id(), invoice.id(), event.paid_at)
            .await
        {
            Ok(paid) => {
                let entry = LedgerEntry::new(
                    paid.org_id(),
                    EntryType::Income,
                    LedgerEntry::SUBTYPE_INVOICE_PAYMENT,
                    event.amount,
                    event.paid_at.date_naive(),
                )?
                .with_invoice(paid.id())
                .with_client(paid.client_id());
                self.ledger.create(&entry).await?;
                Ok(())
            }
            Err(err) if err.is_conflict() => {
                // Already settled (e.g. duplicate webhook delivery); the
                // payment record stays, reconciliation dedups the rest.
                tracing::warn!(
                    invoice_id = %invoice.id(),
                    "gateway payment for an already settled invoice"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
