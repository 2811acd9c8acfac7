use std::collections::HashMap;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::Mutex;

use super::{buddhist_year_label, prefix_for, SequenceStore, SubmissionNumberGenerator, SEQUENTIAL_ATTEMPTS};

const RANDOM_ATTEMPTS: usize = 5;

/// Store-backed generator guarded by one process-wide lock.
///
/// The lock also protects a per `{prefix}-{year}` high-water mark of the numbers this
/// process has handed out, so callers that have not persisted their number yet are
/// not given the same candidate again.
pub struct SequenceGenerator<S> {
    store: S,
    issued: Mutex<HashMap<String, i64>>,
}

impl<S: SequenceStore> SequenceGenerator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn is_taken(&self, number: &str) -> bool {
        match self.store.number_exists(number).await {
            Ok(exists) => exists,
            Err(e) => {
                log::warn!("uniqueness check for {} failed, skipping candidate: {}", number, e);
                true
            }
        }
    }
}

#[async_trait]
impl<S: SequenceStore> SubmissionNumberGenerator for SequenceGenerator<S> {
    async fn generate(&self, submission_type: &str) -> String {
        let mut issued = self.issued.lock().await;

        let configured = match self.store.current_year_label().await {
            Ok(label) => label,
            Err(e) => {
                log::warn!("failed to read current year from system config: {}", e);
                None
            }
        };
        let year = buddhist_year_label(configured.as_deref());
        let prefix = prefix_for(submission_type);
        let series = format!("{}-{}", prefix, year);

        let existing = match self.store.count_numbers_with_prefix(&series).await {
            Ok(count) => count,
            Err(e) => {
                log::warn!("failed to count submissions for {}: {}", series, e);
                0
            }
        };
        let seed = existing.max(issued.get(&series).copied().unwrap_or(0));

        for offset in 1..=SEQUENTIAL_ATTEMPTS {
            let sequence = seed + offset;
            let candidate = format!("{}-{:04}", series, sequence);
            if !self.is_taken(&candidate).await {
                issued.insert(series, sequence);
                return candidate;
            }
        }

        log::warn!(
            "all {} sequential candidates for {} are taken, using random suffix",
            SEQUENTIAL_ATTEMPTS,
            series
        );

        let mut candidate = random_candidate(&series);
        for _ in 1..RANDOM_ATTEMPTS {
            if !self.is_taken(&candidate).await {
                break;
            }
            candidate = random_candidate(&series);
        }
        candidate
    }
}

fn random_candidate(series: &str) -> String {
    let mut bytes = [0u8; 3];
    OsRng.fill_bytes(&mut bytes);
    format!("{}-R-{}", series, hex::encode_upper(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::collections::HashSet;

    struct FixedStore {
        count: i64,
        taken: HashSet<String>,
    }

    #[async_trait]
    impl SequenceStore for FixedStore {
        async fn current_year_label(&self) -> Result<Option<String>, PipelineError> {
            Ok(Some("2568".to_string()))
        }

        async fn count_numbers_with_prefix(&self, _prefix: &str) -> Result<i64, PipelineError> {
            Ok(self.count)
        }

        async fn number_exists(&self, number: &str) -> Result<bool, PipelineError> {
            Ok(self.taken.contains(number))
        }
    }

    #[tokio::test]
    async fn test_first_number_follows_count() {
        let generator = SequenceGenerator::new(FixedStore {
            count: 4,
            taken: HashSet::new(),
        });
        assert_eq!(generator.generate("publication_reward").await, "PR-2568-0005");
        assert_eq!(generator.generate("publication_reward").await, "PR-2568-0006");
        assert_eq!(generator.generate("fund_application").await, "FA-2568-0005");
    }

    #[tokio::test]
    async fn test_skips_taken_candidates() {
        let taken = ["PR-2568-0001", "PR-2568-0002"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let generator = SequenceGenerator::new(FixedStore { count: 0, taken });
        assert_eq!(generator.generate("publication_reward").await, "PR-2568-0003");
    }

    #[tokio::test]
    async fn test_random_fallback_after_ten_collisions() {
        let taken = (1..=10).map(|i| format!("TR-2568-{:04}", i)).collect();
        let generator = SequenceGenerator::new(FixedStore { count: 0, taken });
        let number = generator.generate("training_request").await;
        assert!(number.starts_with("TR-2568-R-"), "got {}", number);
        let suffix = number.trim_start_matches("TR-2568-R-");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
