//! Installment period database operations

use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection};

use crate::installment::{resolve_installment_number, InstallmentPeriod};

pub async fn fetch_installment_periods(
    conn: &mut PgConnection,
    year_id: i32,
) -> Result<Vec<InstallmentPeriod>, sqlx::Error> {
    sqlx::query_as::<_, InstallmentPeriod>(
        r#"
        SELECT installment_period_id, year_id, installment_number, cutoff_date, status, deleted_at
        FROM fund_installment_periods
        WHERE deleted_at IS NULL AND year_id = $1
        ORDER BY cutoff_date ASC, installment_number ASC
        "#,
    )
    .bind(year_id)
    .fetch_all(conn)
    .await
}

/// Installment number for a submission made at `at`.
///
/// The lookup runs under a savepoint on `conn`, so it can share the submit transaction.
/// Failures and an empty calendar are logged and yield `None`; they never fail the caller
/// or leave the surrounding transaction aborted.
pub async fn resolve_installment_for(
    conn: &mut PgConnection,
    year_id: i32,
    at: DateTime<Utc>,
) -> Option<i32> {
    let mut savepoint = match conn.begin().await {
        Ok(savepoint) => savepoint,
        Err(e) => {
            log::warn!("failed to open savepoint for installment lookup: {}", e);
            return None;
        }
    };

    let periods = fetch_installment_periods(&mut savepoint, year_id).await;

    // Read-only; rolling back also clears a failed query.
    if let Err(e) = savepoint.rollback().await {
        log::warn!("failed to release installment lookup savepoint: {}", e);
    }

    let periods = match periods {
        Ok(periods) => periods,
        Err(e) => {
            log::warn!("failed to load installment periods for year {}: {}", year_id, e);
            return None;
        }
    };

    let resolved = resolve_installment_number(&periods, at);
    if resolved.is_none() {
        log::warn!("no active installment period configured for year {}", year_id);
    }
    resolved
}
