//! Integration tests for temporal types

use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::America::Sao_Paulo;

use core_kernel::temporal::{clamped_day_of_month, last_day_of_month};
use core_kernel::{BillingCycle, DateRange, Timezone};

#[test]
fn monthly_cycle_windows_partition_the_calendar() {
    let jan = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
    let feb = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

    let w1 = BillingCycle::Monthly.window_containing(jan);
    let w2 = BillingCycle::Monthly.window_containing(feb);

    assert_eq!(w1.end, jan);
    assert_eq!(w2.start, feb);
    assert!(!w1.contains(feb));
    assert!(!w2.contains(jan));
}

#[test]
fn last_day_of_december_rolls_the_year() {
    assert_eq!(
        last_day_of_month(2025, 12),
        NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
    );
}

#[test]
fn leap_february_keeps_day_29() {
    assert_eq!(
        clamped_day_of_month(2028, 2, 29).unwrap(),
        NaiveDate::from_ymd_opt(2028, 2, 29).unwrap()
    );
}

#[test]
fn local_period_edges_differ_from_utc() {
    let tz = Timezone::new(Sao_Paulo);
    let window = DateRange::month_of(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
    let period = window.to_period(&tz);

    // Sao Paulo is UTC-3: the local month starts at 03:00 UTC.
    assert_eq!(
        period.start,
        Utc.with_ymd_and_hms(2025, 6, 1, 3, 0, 0).unwrap()
    );
}

#[test]
fn local_date_respects_timezone() {
    let tz = Timezone::new(Sao_Paulo);
    // 01:00 UTC on July 2nd is still July 1st in Sao Paulo.
    let instant = Utc.with_ymd_and_hms(2025, 7, 2, 1, 0, 0).unwrap();
    assert_eq!(
        tz.local_date(instant),
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    );
}

#[test]
fn date_range_day_count_is_inclusive() {
    let window = DateRange::month_of(NaiveDate::from_ymd_opt(2025, 2, 10).unwrap());
    assert_eq!(window.days(), 28);
}
