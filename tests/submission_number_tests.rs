//! Submission number generation under concurrency.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::MemoryStore;
use regex::Regex;
use research_fund_server::numbering::{SequenceGenerator, SubmissionNumberGenerator};

#[tokio::test]
async fn test_concurrent_generation_yields_distinct_numbers() {
    let generator = Arc::new(SequenceGenerator::new(MemoryStore::with_year("2568/2569")));

    let mut handles = Vec::new();
    for _ in 0..100 {
        let generator = generator.clone();
        handles.push(tokio::spawn(async move {
            let number = generator.generate("publication_reward").await;
            generator.store().persist(&number);
            number
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        let number = handle.await.unwrap();
        assert!(!number.is_empty());
        assert!(numbers.insert(number.clone()), "duplicate number {}", number);
    }
    assert_eq!(numbers.len(), 100);

    let pattern = Regex::new(r"^PR-2568-(\d{4}|R-[0-9A-F]{6})$").unwrap();
    for number in &numbers {
        assert!(pattern.is_match(number), "unexpected format {}", number);
    }
}

#[tokio::test]
async fn test_unpersisted_numbers_are_not_reissued() {
    let generator = SequenceGenerator::new(MemoryStore::with_year("2568"));

    let first = generator.generate("fund_application").await;
    let second = generator.generate("fund_application").await;

    assert_eq!(first, "FA-2568-0001");
    assert_eq!(second, "FA-2568-0002");
}

#[tokio::test]
async fn test_unknown_type_uses_generic_prefix() {
    let generator = SequenceGenerator::new(MemoryStore::with_year("ปีงบประมาณ 2567"));
    assert_eq!(generator.generate("something_else").await, "SUB-2567-0001");
}
