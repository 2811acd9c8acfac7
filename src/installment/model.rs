use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A row of `fund_installment_periods`.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema, sqlx::FromRow)]
pub struct InstallmentPeriod {
    pub installment_period_id: i32,
    pub year_id: i32,
    pub installment_number: i32,
    /// `None` when the cutoff was never configured.
    pub cutoff_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}
