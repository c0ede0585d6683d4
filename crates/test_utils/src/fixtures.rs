//! Pre-built test data for common entities

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use rust_decimal_macros::dec;

use core_kernel::{ClientId, Currency, InvoiceId, Money, OrgId, PaymentId, Timezone};

/// One organisation shared by fixtures that want a stable tenant
static DEFAULT_ORG: Lazy<OrgId> = Lazy::new(OrgId::new_v7);

/// Common monetary amounts
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A typical monthly retainer
    pub fn retainer() -> Money {
        Money::new(dec!(2500.00), Currency::BRL).unwrap()
    }

    /// A typical recurring expense
    pub fn rent() -> Money {
        Money::new(dec!(1200.00), Currency::BRL).unwrap()
    }

    /// A small ad-hoc receipt
    pub fn small_receipt() -> Money {
        Money::new(dec!(150.00), Currency::BRL).unwrap()
    }

    pub fn zero() -> Money {
        Money::zero(Currency::BRL)
    }
}

/// Fixed points in time for deterministic tests
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Mid-March 2025, a Saturday
    pub fn run_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    /// The local date of `run_instant` in UTC
    pub fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    pub fn utc() -> Timezone {
        Timezone::default()
    }

    pub fn yesterday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    pub fn next_month() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()
    }
}

/// Fresh identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn org_id() -> OrgId {
        OrgId::new_v7()
    }

    /// The shared default organisation
    pub fn default_org() -> OrgId {
        *DEFAULT_ORG
    }

    pub fn client_id() -> ClientId {
        ClientId::new_v7()
    }

    pub fn invoice_id() -> InvoiceId {
        InvoiceId::new_v7()
    }

    pub fn payment_id() -> PaymentId {
        PaymentId::new_v7()
    }
}
