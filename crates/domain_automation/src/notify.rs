//! Outbound notifications
//!
//! The core emits one notification per significant lifecycle transition
//! (invoice created, payment confirmed, payment overdue) through an
//! external notifier. Dispatch is always fire-and-forget: a notifier
//! outage is logged and never rolls back or fails the financial write
//! that triggered it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, DomainPort, OrgId, PortError};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    InvoiceCreated,
    PaymentConfirmed,
    PaymentOverdue,
}

/// Delivery priority hint for the notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

/// A notification handed to the external notifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub org_id: OrgId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// In-app link to the subject record
    pub link: String,
    pub client_id: Option<ClientId>,
    pub priority: NotificationPriority,
}

/// Port to the external notification dispatcher
#[async_trait]
pub trait NotificationPort: DomainPort {
    async fn dispatch(&self, notification: Notification) -> Result<(), PortError>;
}

/// Dispatches a notification, logging failure instead of returning it
///
/// Callers sit inside financial writes; delivery failure must not
/// propagate.
pub async fn dispatch_fire_and_forget(notifier: &dyn NotificationPort, notification: Notification) {
    let kind = notification.kind;
    let org_id = notification.org_id;
    if let Err(err) = notifier.dispatch(notification).await {
        tracing::warn!(
            %org_id,
            ?kind,
            error = %err,
            "notification dispatch failed; continuing"
        );
    }
}
