//! Installment periods - which billing window a submission falls into.

pub mod model;
pub mod resolver;

pub use model::InstallmentPeriod;
pub use resolver::{end_of_day_utc, is_period_active, resolve_installment_number};
