//! Installment resolution against a year's cutoff calendar.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use research_fund_server::installment::{resolve_installment_number, InstallmentPeriod};

fn period(number: i32, cutoff: Option<&str>, status: Option<&str>) -> InstallmentPeriod {
    InstallmentPeriod {
        installment_period_id: number * 10,
        year_id: 3,
        installment_number: number,
        cutoff_date: cutoff.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
        status: status.map(str::to_string),
        deleted_at: None,
    }
}

fn quarterly() -> Vec<InstallmentPeriod> {
    vec![
        period(3, Some("2024-09-30"), Some("active")),
        period(1, Some("2024-03-31"), Some("active")),
        period(2, Some("2024-06-30"), None),
    ]
}

#[test]
fn test_end_of_cutoff_day_belongs_to_that_period() {
    let periods = quarterly();
    let last_instant = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap() + Duration::nanoseconds(999_999_999);

    assert_eq!(resolve_installment_number(&periods, last_instant), Some(2));
    assert_eq!(
        resolve_installment_number(&periods, last_instant - Duration::microseconds(1)),
        Some(2)
    );
}

#[test]
fn test_day_after_cutoff_moves_to_next_period() {
    let periods = quarterly();
    let at = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
    assert_eq!(resolve_installment_number(&periods, at), Some(3));
}

#[test]
fn test_after_every_cutoff_rolls_into_last_period() {
    let periods = quarterly();
    let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(resolve_installment_number(&periods, at), Some(3));
}

#[test]
fn test_before_first_cutoff_is_first_period() {
    let periods = quarterly();
    let at = Utc.with_ymd_and_hms(2023, 10, 1, 8, 0, 0).unwrap();
    assert_eq!(resolve_installment_number(&periods, at), Some(1));
}

#[test]
fn test_inactive_period_is_never_returned() {
    let periods = vec![
        period(1, Some("2024-03-31"), Some("active")),
        period(2, Some("2024-06-30"), Some("Closed")),
        period(3, Some("2024-09-30"), Some(" ")),
    ];
    let in_second_window = Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap();
    assert_eq!(resolve_installment_number(&periods, in_second_window), Some(3));
}

#[test]
fn test_every_inactive_synonym_is_excluded() {
    for status in ["inactive", "DISABLED", "closed", "archived", "suspended", "deleted"] {
        let periods = vec![period(1, Some("2024-03-31"), Some(status))];
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(resolve_installment_number(&periods, at), None, "status {}", status);
    }
}

#[test]
fn test_only_inactive_periods_means_no_assignment() {
    let periods = vec![
        period(1, Some("2024-03-31"), Some("inactive")),
        period(2, Some("2024-06-30"), Some("archived")),
    ];
    let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    assert_eq!(resolve_installment_number(&periods, at), None);
}

#[test]
fn test_no_periods_configured() {
    let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    assert_eq!(resolve_installment_number(&[], at), None);
}

#[test]
fn test_period_without_cutoff_is_skipped_when_matching() {
    let periods = vec![
        period(9, None, None),
        period(1, Some("2024-03-31"), None),
        period(2, Some("2024-06-30"), None),
    ];
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(resolve_installment_number(&periods, at), Some(1));
}

// Known quirk kept on purpose: the positional fallback does not look at the cutoff, so
// a calendar made only of cutoff-less periods still assigns the last of them. Changing
// this needs a product decision; update this test together with the resolver.
#[test]
fn test_cutoff_less_period_can_still_be_the_fallback() {
    let periods = vec![period(1, None, None), period(2, None, Some("active"))];
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(resolve_installment_number(&periods, at), Some(2));
}
