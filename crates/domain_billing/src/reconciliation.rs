//! Revenue reconciliation
//!
//! Ledger entries and payments are written by different code paths
//! (manual bookkeeping vs. gateway webhooks) and can describe the same
//! real-world receipt. The invoice link is the only reliable join key:
//! when both an income entry and a payment reference the same invoice,
//! the payment is skipped so the receipt is counted once. Records without
//! an invoice link are assumed independent and both counted.
//!
//! The engine is a pure function of its inputs: same entries and
//! payments, same total.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use core_kernel::{Currency, InvoiceId, LedgerEntryId, Money, PaymentId};

use crate::error::BillingError;
use crate::ledger::LedgerEntry;
use crate::payment::{Payment, PaymentStatus};

/// The dedup key for one economic event
///
/// A tagged union instead of a concatenated string key: an invoice-linked
/// record can never collide with an unlinked one, whatever the ids look
/// like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevenueKey {
    /// Keyed by the invoice both subsystems may reference
    ByInvoice(InvoiceId),
    /// An unlinked ledger entry, keyed by itself
    ByEntry(LedgerEntryId),
    /// An unlinked payment, keyed by itself
    ByPayment(PaymentId),
}

/// The deduplicated revenue figure for a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciledRevenue {
    /// Sum over all revenue buckets
    pub total: Money,
    /// Number of distinct economic events recognized
    pub recognized: usize,
    /// Payments skipped because a ledger entry already recorded their invoice
    pub deduplicated: usize,
}

/// Reconciles two independently recorded revenue streams into one figure
///
/// Income ledger entries are accumulated first; multiple entries sharing
/// an invoice (partial payments) accumulate under that invoice's key,
/// never overwrite. Payments are then merged in: an invoice-linked
/// payment whose invoice key is already present is skipped entirely,
/// anything else is added under its own key. Cancelled entries and
/// failed/refunded payments never count.
///
/// # Errors
///
/// Returns a `Money` error when the inputs mix currencies; revenue is a
/// single-currency figure.
pub fn reconcile_revenue(
    entries: &[LedgerEntry],
    payments: &[Payment],
    currency: Currency,
) -> Result<ReconciledRevenue, BillingError> {
    let mut revenue: HashMap<RevenueKey, Money> = HashMap::new();
    let mut deduplicated = 0usize;

    for entry in entries {
        if !entry.counts_as_revenue() {
            continue;
        }
        let key = match entry.invoice_id {
            Some(invoice_id) => RevenueKey::ByInvoice(invoice_id),
            None => RevenueKey::ByEntry(entry.id),
        };
        accumulate(&mut revenue, key, entry.amount, currency)?;
    }

    for payment in payments {
        if matches!(
            payment.status(),
            PaymentStatus::Failed | PaymentStatus::Refunded
        ) {
            continue;
        }
        let key = match payment.invoice_id() {
            Some(invoice_id) => {
                let key = RevenueKey::ByInvoice(invoice_id);
                if revenue.contains_key(&key) {
                    // The same economic event was already recorded by a
                    // ledger entry (or an earlier payment) for this
                    // invoice; counting it again would double the figure.
                    deduplicated += 1;
                    tracing::debug!(
                        payment_id = %payment.id(),
                        invoice_id = %invoice_id,
                        "skipping payment already covered by ledger entry"
                    );
                    continue;
                }
                key
            }
            None => RevenueKey::ByPayment(payment.id()),
        };
        accumulate(&mut revenue, key, payment.amount(), currency)?;
    }

    let mut total = Money::zero(currency);
    for amount in revenue.values() {
        total = total.checked_add(amount)?;
    }

    Ok(ReconciledRevenue {
        total,
        recognized: revenue.len(),
        deduplicated,
    })
}

fn accumulate(
    revenue: &mut HashMap<RevenueKey, Money>,
    key: RevenueKey,
    amount: Money,
    currency: Currency,
) -> Result<(), BillingError> {
    if amount.currency() != currency {
        return Err(BillingError::Money(
            core_kernel::MoneyError::CurrencyMismatch(
                amount.currency().to_string(),
                currency.to_string(),
            ),
        ));
    }
    let slot = revenue.entry(key).or_insert_with(|| Money::zero(currency));
    *slot = slot.checked_add(&amount)?;
    Ok(())
}
