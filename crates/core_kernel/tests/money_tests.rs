//! Integration tests for money types

use rust_decimal_macros::dec;

use core_kernel::{Currency, Money, MoneyError};

#[test]
fn money_display_uses_currency_symbol() {
    let m = Money::new(dec!(1234.5), Currency::BRL).unwrap();
    assert_eq!(m.to_string(), "R$ 1234.50");

    let m = Money::new(dec!(1234.5), Currency::EUR).unwrap();
    assert_eq!(m.to_string(), "€ 1234.50");
}

#[test]
fn money_serde_round_trip() {
    let m = Money::new(dec!(99.90), Currency::USD).unwrap();
    let json = serde_json::to_string(&m).unwrap();
    let back: Money = serde_json::from_str(&json).unwrap();
    assert_eq!(m, back);
}

#[test]
fn money_rejects_negative_through_serde_boundary() {
    // Deserialization goes through the raw struct shape, so a consumer
    // re-validating restored amounts relies on entity-level checks. The
    // constructor path is the one that must reject.
    let err = Money::new(dec!(-0.01), Currency::USD).unwrap_err();
    assert!(matches!(err, MoneyError::NegativeAmount(_)));
}

#[test]
fn zero_is_not_positive() {
    let zero = Money::zero(Currency::BRL);
    assert!(zero.is_zero());
    assert!(!zero.is_positive());
}

#[test]
fn round_to_currency_respects_decimal_places() {
    let m = Money::new(dec!(10.005), Currency::BRL).unwrap();
    assert_eq!(m.round_to_currency().amount(), dec!(10.00));

    let yen = Money::new(dec!(100.4), Currency::JPY).unwrap();
    assert_eq!(yen.round_to_currency().amount(), dec!(100));
}
