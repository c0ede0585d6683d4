//! Notification sink for batch runs
//!
//! Delivery itself belongs to the external notifier service; the jobs
//! binary records what would be dispatched. Swap this adapter for the
//! real one where the notifier is reachable.

use async_trait::async_trait;

use core_kernel::{DomainPort, PortError};
use domain_automation::{Notification, NotificationPort};

/// Logs notifications instead of delivering them
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl DomainPort for TracingNotifier {}

#[async_trait]
impl NotificationPort for TracingNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), PortError> {
        tracing::info!(
            org_id = %notification.org_id,
            kind = ?notification.kind,
            title = %notification.title,
            link = %notification.link,
            "notification"
        );
        Ok(())
    }
}
