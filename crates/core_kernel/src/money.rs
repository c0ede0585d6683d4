//! Money types with precise decimal arithmetic
//!
//! This module provides a type-safe representation of monetary values
//! using rust_decimal for precise calculations without floating-point errors.
//!
//! Amounts are non-negative by construction: a refund that exceeds the
//! refunded payment, or a discount that exceeds an invoice subtotal, fails
//! at the arithmetic layer instead of producing a negative balance.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    BRL,
    USD,
    EUR,
    GBP,
    JPY,
    CHF,
    AUD,
    CAD,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::BRL => "R$",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CHF => "CHF",
            Currency::AUD => "A$",
            Currency::CAD => "C$",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::BRL => "BRL",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CHF => "CHF",
            Currency::AUD => "AUD",
            Currency::CAD => "CAD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BRL" => Ok(Currency::BRL),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "JPY" => Ok(Currency::JPY),
            "CHF" => Ok(Currency::CHF),
            "AUD" => Ok(Currency::AUD),
            "CAD" => Ok(Currency::CAD),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Negative amount: {0}")]
    NegativeAmount(Decimal),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),
}

/// A monetary amount with associated currency
///
/// Money uses rust_decimal for precise arithmetic without floating-point
/// errors. Amounts are stored with 4 decimal places internally and are
/// always non-negative; subtraction that would cross zero is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::NegativeAmount` if `amount` is negative.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::NegativeAmount(amount));
        }
        Ok(Self {
            amount: amount.round_dp(4),
            currency,
        })
    }

    /// Creates Money from an integer amount in minor units (e.g., cents)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Result<Self, MoneyError> {
        let divisor = Decimal::new(10_i64.pow(currency.decimal_places()), 0);
        Self::new(Decimal::new(minor_units, 0) / divisor, currency)
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: dec!(0),
            currency,
        }
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        !self.amount.is_zero()
    }

    /// Rounds to the currency's standard decimal places
    pub fn round_to_currency(&self) -> Self {
        Self {
            amount: self.amount.round_dp(self.currency.decimal_places()),
            currency: self.currency,
        }
    }

    /// Checked addition that returns an error on currency mismatch
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Self::new(self.amount + other.amount, self.currency)
    }

    /// Checked subtraction
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::CurrencyMismatch` when the currencies differ and
    /// `MoneyError::NegativeAmount` when `other` exceeds `self`.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Self::new(self.amount - other.amount, self.currency)
    }

    /// Multiplies by a non-negative scalar (e.g., an item quantity)
    pub fn multiply(&self, factor: Decimal) -> Result<Self, MoneyError> {
        if factor.is_sign_negative() {
            return Err(MoneyError::InvalidAmount(format!(
                "Cannot multiply by negative factor {}",
                factor
            )));
        }
        Self::new(self.amount * factor, self.currency)
    }

    /// Allocates the money into n equal parts, handling remainders
    ///
    /// The remainder is distributed among the first allocations so the
    /// parts always sum exactly to the original amount. Used to split a
    /// contract value into installments.
    pub fn allocate(&self, n: u32) -> Result<Vec<Money>, MoneyError> {
        if n == 0 {
            return Err(MoneyError::InvalidAmount(
                "Cannot allocate to zero parts".to_string(),
            ));
        }

        let dp = self.currency.decimal_places();
        let total_minor = self.amount * Decimal::new(10_i64.pow(dp), 0);
        let total_minor = total_minor.round().mantissa();

        let base_amount = total_minor / n as i128;
        let remainder = (total_minor % n as i128) as u32;

        let mut allocations = Vec::with_capacity(n as usize);
        for i in 0..n {
            let minor = if i < remainder {
                base_amount + 1
            } else {
                base_amount
            };
            allocations.push(Money::from_minor(minor as i64, self.currency)?);
        }

        Ok(allocations)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places();
        write!(
            f,
            "{} {:.dp$}",
            self.currency.symbol(),
            self.amount,
            dp = dp as usize
        )
    }
}

impl Add for Money {
    type Output = Self;

    /// # Panics
    ///
    /// Panics on currency mismatch; use `checked_add` when the currencies
    /// are not known to match.
    fn add(self, other: Self) -> Self {
        self.checked_add(&other)
            .expect("Currency mismatch in Money::add")
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn money_allocation_sum_equals_original(
            amount in 0i64..1_000_000_000i64,
            parts in 1u32..100u32
        ) {
            let money = Money::from_minor(amount, Currency::BRL).unwrap();
            let allocations = money.allocate(parts).unwrap();

            let total: Decimal = allocations.iter().map(|m| m.amount()).sum();
            prop_assert_eq!(total, money.amount());
        }

        #[test]
        fn money_addition_is_associative(
            a in 0i64..1_000_000i64,
            b in 0i64..1_000_000i64,
            c in 0i64..1_000_000i64
        ) {
            let ma = Money::from_minor(a, Currency::BRL).unwrap();
            let mb = Money::from_minor(b, Currency::BRL).unwrap();
            let mc = Money::from_minor(c, Currency::BRL).unwrap();

            prop_assert_eq!((ma + mb) + mc, ma + (mb + mc));
        }

        #[test]
        fn money_is_never_negative(amount in 0i64..1_000_000_000i64) {
            let money = Money::from_minor(amount, Currency::BRL).unwrap();
            prop_assert!(!money.amount().is_sign_negative() || money.amount().is_zero());
        }
    }
}
