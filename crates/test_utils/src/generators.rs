//! Property-based and fake test data generators

use chrono::NaiveDate;
use fake::faker::company::en::CompanyName;
use fake::Fake;
use proptest::prelude::*;

use core_kernel::{Currency, Money};

/// Strategy producing non-negative BRL amounts up to one million
pub fn money_strategy() -> impl Strategy<Value = Money> {
    (0i64..100_000_000i64).prop_map(|minor| Money::from_minor(minor, Currency::BRL).unwrap())
}

/// Strategy producing strictly positive BRL amounts
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (1i64..100_000_000i64).prop_map(|minor| Money::from_minor(minor, Currency::BRL).unwrap())
}

/// Strategy producing dates across several years
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (2020i32..2030i32, 1u32..=12u32, 1u32..=28u32)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

/// A plausible client/company name
pub fn fake_client_name() -> String {
    CompanyName().fake()
}
