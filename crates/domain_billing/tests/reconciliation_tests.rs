//! Tests for the revenue reconciliation engine
//!
//! These exercise the dedup rules the dashboards depend on: a receipt
//! recorded by both bookkeeping and a gateway webhook must count once.

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use core_kernel::{ClientId, Currency, InvoiceId, Money, OrgId};

use domain_billing::invoice::{Invoice, InvoiceItem};
use domain_billing::ledger::{EntryType, LedgerEntry};
use domain_billing::payment::{Payment, PaymentMethod};
use domain_billing::reconciliation::reconcile_revenue;
use domain_billing::BillingError;

fn brl(amount: rust_decimal::Decimal) -> Money {
    Money::new(amount, Currency::BRL).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn income_entry(org_id: OrgId, amount: Money, invoice_id: Option<InvoiceId>) -> LedgerEntry {
    let entry = LedgerEntry::new(
        org_id,
        EntryType::Income,
        LedgerEntry::SUBTYPE_INVOICE_PAYMENT,
        amount,
        date(2025, 3, 10),
    )
    .unwrap();
    match invoice_id {
        Some(id) => entry.with_invoice(id),
        None => entry,
    }
}

fn invoice_for(org_id: OrgId, amount: Money) -> Invoice {
    let items = vec![InvoiceItem::new("Retainer", dec!(1), amount).unwrap()];
    Invoice::create(
        org_id,
        ClientId::new_v7(),
        "INV-TEST",
        date(2025, 3, 1),
        date(2025, 3, 10),
        items,
        Money::zero(amount.currency()),
        Money::zero(amount.currency()),
    )
    .unwrap()
}

fn unlinked_payment(org_id: OrgId, amount: Money) -> Payment {
    Payment::create(org_id, None, amount, PaymentMethod::Pix).unwrap()
}

#[test]
fn dedup_correctness_linked_entry_and_payment_count_once() {
    let org_id = OrgId::new_v7();
    let invoice = invoice_for(org_id, brl(dec!(1000)));

    let entries = vec![income_entry(org_id, brl(dec!(1000)), Some(invoice.id()))];
    let payments =
        vec![Payment::create_for_invoice(&invoice, brl(dec!(1000)), PaymentMethod::Pix).unwrap()];

    let revenue = reconcile_revenue(&entries, &payments, Currency::BRL).unwrap();

    assert_eq!(revenue.total, brl(dec!(1000)));
    assert_eq!(revenue.recognized, 1);
    assert_eq!(revenue.deduplicated, 1);
}

#[test]
fn dedup_non_interference_unlinked_payment_still_counts() {
    let org_id = OrgId::new_v7();
    let invoice = invoice_for(org_id, brl(dec!(1000)));

    let entries = vec![income_entry(org_id, brl(dec!(1000)), Some(invoice.id()))];
    let payments = vec![unlinked_payment(org_id, brl(dec!(500)))];

    let revenue = reconcile_revenue(&entries, &payments, Currency::BRL).unwrap();

    assert_eq!(revenue.total, brl(dec!(1500)));
    assert_eq!(revenue.recognized, 2);
    assert_eq!(revenue.deduplicated, 0);
}

#[test]
fn entries_sharing_an_invoice_accumulate() {
    let org_id = OrgId::new_v7();
    let invoice = invoice_for(org_id, brl(dec!(1000)));

    // Two partial payments recorded as separate ledger entries
    let entries = vec![
        income_entry(org_id, brl(dec!(400)), Some(invoice.id())),
        income_entry(org_id, brl(dec!(600)), Some(invoice.id())),
    ];
    let payments =
        vec![Payment::create_for_invoice(&invoice, brl(dec!(1000)), PaymentMethod::Boleto).unwrap()];

    let revenue = reconcile_revenue(&entries, &payments, Currency::BRL).unwrap();

    // 400 + 600 accumulate under one key; the gateway payment is skipped
    assert_eq!(revenue.total, brl(dec!(1000)));
    assert_eq!(revenue.recognized, 1);
    assert_eq!(revenue.deduplicated, 1);
}

#[test]
fn linked_payment_counts_when_no_entry_exists() {
    let org_id = OrgId::new_v7();
    let invoice = invoice_for(org_id, brl(dec!(750)));

    let payments =
        vec![Payment::create_for_invoice(&invoice, brl(dec!(750)), PaymentMethod::Pix).unwrap()];

    let revenue = reconcile_revenue(&[], &payments, Currency::BRL).unwrap();
    assert_eq!(revenue.total, brl(dec!(750)));
}

#[test]
fn second_payment_on_same_invoice_is_skipped() {
    let org_id = OrgId::new_v7();
    let invoice = invoice_for(org_id, brl(dec!(500)));

    let payments = vec![
        Payment::create_for_invoice(&invoice, brl(dec!(500)), PaymentMethod::Pix).unwrap(),
        Payment::create_for_invoice(&invoice, brl(dec!(500)), PaymentMethod::Pix).unwrap(),
    ];

    let revenue = reconcile_revenue(&[], &payments, Currency::BRL).unwrap();

    // The invoice key is the economic event: it is counted once
    assert_eq!(revenue.total, brl(dec!(500)));
    assert_eq!(revenue.deduplicated, 1);
}

#[test]
fn expense_and_cancelled_entries_are_excluded() {
    let org_id = OrgId::new_v7();

    let expense = LedgerEntry::new(
        org_id,
        EntryType::Expense,
        LedgerEntry::SUBTYPE_RECURRING_EXPENSE,
        brl(dec!(300)),
        date(2025, 3, 5),
    )
    .unwrap();

    let mut cancelled = income_entry(org_id, brl(dec!(200)), None);
    cancelled.cancel().unwrap();

    let counted = income_entry(org_id, brl(dec!(100)), None);

    let revenue =
        reconcile_revenue(&[expense, cancelled, counted], &[], Currency::BRL).unwrap();
    assert_eq!(revenue.total, brl(dec!(100)));
}

#[test]
fn failed_and_refunded_payments_are_excluded() {
    let org_id = OrgId::new_v7();

    let mut failed = unlinked_payment(org_id, brl(dec!(400)));
    failed.fail("card declined").unwrap();

    let mut refunded = unlinked_payment(org_id, brl(dec!(300)));
    refunded.process(None).unwrap();
    refunded.verify().unwrap();
    refunded.refund(None).unwrap();

    let counted = unlinked_payment(org_id, brl(dec!(250)));

    let revenue =
        reconcile_revenue(&[], &[failed, refunded, counted], Currency::BRL).unwrap();
    assert_eq!(revenue.total, brl(dec!(250)));
}

#[test]
fn reconciliation_is_a_pure_function_of_its_inputs() {
    let org_id = OrgId::new_v7();
    let invoice = invoice_for(org_id, brl(dec!(1000)));

    let entries = vec![
        income_entry(org_id, brl(dec!(1000)), Some(invoice.id())),
        income_entry(org_id, brl(dec!(150)), None),
    ];
    let payments = vec![
        Payment::create_for_invoice(&invoice, brl(dec!(1000)), PaymentMethod::Pix).unwrap(),
        unlinked_payment(org_id, brl(dec!(90))),
    ];

    let first = reconcile_revenue(&entries, &payments, Currency::BRL).unwrap();
    let second = reconcile_revenue(&entries, &payments, Currency::BRL).unwrap();

    assert_eq!(first.total, second.total);
    assert_eq!(first.recognized, second.recognized);
    assert_eq!(first.total, brl(dec!(1240)));
}

#[test]
fn mixed_currencies_are_an_error() {
    let org_id = OrgId::new_v7();
    let entries = vec![income_entry(org_id, brl(dec!(100)), None)];
    let payments = vec![unlinked_payment(
        org_id,
        Money::new(dec!(100), Currency::USD).unwrap(),
    )];

    let result = reconcile_revenue(&entries, &payments, Currency::BRL);
    assert!(matches!(result, Err(BillingError::Money(_))));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The deduplicated total never exceeds the gross sum of all inputs.
        #[test]
        fn total_never_exceeds_gross_sum(
            entry_amounts in proptest::collection::vec(1i64..1_000_000i64, 0..8),
            payment_amounts in proptest::collection::vec(1i64..1_000_000i64, 0..8),
        ) {
            let org_id = OrgId::new_v7();
            let entries: Vec<_> = entry_amounts
                .iter()
                .map(|&minor| income_entry(
                    org_id,
                    Money::from_minor(minor, Currency::BRL).unwrap(),
                    None,
                ))
                .collect();
            let payments: Vec<_> = payment_amounts
                .iter()
                .map(|&minor| unlinked_payment(
                    org_id,
                    Money::from_minor(minor, Currency::BRL).unwrap(),
                ))
                .collect();

            let gross: i64 = entry_amounts.iter().sum::<i64>() + payment_amounts.iter().sum::<i64>();
            let gross = Money::from_minor(gross, Currency::BRL).unwrap();

            let revenue = reconcile_revenue(&entries, &payments, Currency::BRL).unwrap();
            prop_assert!(revenue.total.amount() <= gross.amount());
            // With no invoice links at all, nothing can be deduplicated
            prop_assert_eq!(revenue.total.amount(), gross.amount());
        }
    }
}
