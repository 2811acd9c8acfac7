//! Submission numbers - `{prefix}-{BE year}-{seq:04}` with a random fallback.

pub mod generator;

use async_trait::async_trait;
use chrono::{Datelike, Local};

use crate::error::PipelineError;

pub use generator::SequenceGenerator;

/// Attempts made with sequential candidates before switching to a random suffix.
pub const SEQUENTIAL_ATTEMPTS: i64 = 10;

/// Produces human-readable submission numbers.
///
/// Implementations serialize callers themselves; swapping in a database sequence or a
/// distributed lock only requires another implementation of this trait.
#[async_trait]
pub trait SubmissionNumberGenerator: Send + Sync {
    async fn generate(&self, submission_type: &str) -> String;
}

/// Read access the generator needs from the submission store.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Raw `current_year` label from the latest system configuration, if any.
    async fn current_year_label(&self) -> Result<Option<String>, PipelineError>;
    /// Number of submissions whose number starts with `prefix`.
    async fn count_numbers_with_prefix(&self, prefix: &str) -> Result<i64, PipelineError>;
    async fn number_exists(&self, number: &str) -> Result<bool, PipelineError>;
}

/// Short code for a submission type.
pub fn prefix_for(submission_type: &str) -> &'static str {
    match submission_type {
        "fund_application" => "FA",
        "publication_reward" => "PR",
        "conference_grant" => "CG",
        "training_request" => "TR",
        _ => "SUB",
    }
}

/// Four-digit Buddhist-era year taken from a configured label such as "2568",
/// "2568/2569" or "ปี 2568"; falls back to the current Gregorian year + 543.
pub fn buddhist_year_label(configured: Option<&str>) -> String {
    if let Some(raw) = configured {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() >= 4 {
            return digits[..4].to_string();
        }
    }
    format!("{:04}", Local::now().year() + 543)
}
