//! Installment number resolution from cutoff-date windows.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use super::model::InstallmentPeriod;

/// Status values that take a period out of the billing calendar.
const INACTIVE_STATUSES: [&str; 6] = [
    "inactive",
    "disabled",
    "closed",
    "archived",
    "suspended",
    "deleted",
];

/// A missing or blank status counts as active.
pub fn is_period_active(status: Option<&str>) -> bool {
    let normalized = match status {
        Some(raw) => raw.trim().to_lowercase(),
        None => return true,
    };
    if normalized.is_empty() {
        return true;
    }
    !INACTIVE_STATUSES.contains(&normalized.as_str())
}

/// Last representable instant of `date` in UTC (23:59:59.999999999).
pub fn end_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::nanoseconds(1)
}

/// Determine the installment a submission made at `submitted_at` belongs to.
///
/// Returns `None` when the year has no active period. A submission after the last
/// cutoff rolls into the last active period.
///
/// Periods without a cutoff are never matched by date, but the final fallback takes
/// the last candidate by position, so a cutoff-less period that sorts last is still
/// returned there.
pub fn resolve_installment_number(
    periods: &[InstallmentPeriod],
    submitted_at: DateTime<Utc>,
) -> Option<i32> {
    let mut candidates: Vec<&InstallmentPeriod> = periods
        .iter()
        .filter(|p| p.deleted_at.is_none())
        .filter(|p| is_period_active(p.status.as_deref()))
        .collect();

    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| {
        a.cutoff_date
            .cmp(&b.cutoff_date)
            .then(a.installment_number.cmp(&b.installment_number))
    });

    for period in &candidates {
        let Some(cutoff) = period.cutoff_date else {
            continue;
        };
        if submitted_at <= end_of_day_utc(cutoff) {
            return Some(period.installment_number);
        }
    }

    candidates.last().map(|p| p.installment_number)
}
