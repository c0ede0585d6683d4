//! Custom assertion helpers for domain types

use core_kernel::Money;
use domain_billing::{Invoice, InvoiceStatus};

/// Asserts two monetary values are numerically equal
///
/// Panics with both formatted values on mismatch, which reads better in
/// failures than the derived struct output.
pub fn assert_same_money(actual: Money, expected: Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "currency mismatch: {} vs {}",
        actual,
        expected
    );
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "amount mismatch: {} vs {}",
        actual,
        expected
    );
}

/// Asserts an invoice holds its arithmetic invariant
///
/// `subtotal == Σ item totals` and `total == subtotal - discount + tax`.
pub fn assert_invoice_invariants(invoice: &Invoice) {
    let items_total = invoice
        .items()
        .iter()
        .fold(Money::zero(invoice.currency()), |acc, item| {
            acc + item.total()
        });
    assert_same_money(invoice.subtotal(), items_total);

    let expected_total = invoice
        .subtotal()
        .checked_sub(&invoice.discount())
        .and_then(|after| after.checked_add(&invoice.tax()))
        .expect("invariant arithmetic must not fail");
    assert_same_money(invoice.total(), expected_total);
}

/// Asserts an invoice is open and unpaid
pub fn assert_open(invoice: &Invoice) {
    assert_eq!(invoice.status(), InvoiceStatus::Open);
    assert!(invoice.paid_at().is_none());
}
