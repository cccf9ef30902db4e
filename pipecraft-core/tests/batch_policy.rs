use async_trait::async_trait;
use pipecraft_core::{BatchPolicy, ExtractionError, Extractor, ParameterRecord};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Backend that fails for a fixed set of ids and logs every call.
struct StubExtractor {
    policy: BatchPolicy,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl StubExtractor {
    fn new(delay: Duration, max_retries: usize, failing: &[&str]) -> Self {
        Self {
            policy: BatchPolicy { delay, max_retries },
            failing: failing.iter().map(|id| id.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(&self, params: &ParameterRecord) -> Result<String, ExtractionError> {
        let id = params.get("id").unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(id.clone());
        if self.failing.contains(&id) {
            Err(ExtractionError::Auth(format!("refused {id}")))
        } else {
            Ok(format!("payload {id}"))
        }
    }

    fn batch_policy(&self) -> BatchPolicy {
        self.policy
    }
}

fn ids(ids: &[&str]) -> Vec<ParameterRecord> {
    ids.iter()
        .map(|id| ParameterRecord::from([("id", *id)]))
        .collect()
}

fn fetched_ids(outcomes: &[pipecraft_core::ExtractionOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .filter(|o| o.is_fetched())
        .filter_map(|o| o.params.get("id").map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_leading_failures_past_budget_do_not_drop_later_records() {
    let all: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    let all: Vec<&str> = all.iter().map(String::as_str).collect();
    let extractor = StubExtractor::new(Duration::ZERO, 3, &["0", "1", "2", "3"]);

    let outcomes = extractor.extract_batch(ids(&all)).await;

    assert_eq!(outcomes.len(), 10);
    assert_eq!(extractor.calls(), all);
    assert_eq!(fetched_ids(&outcomes), vec!["4", "5", "6", "7", "8", "9"]);
}

#[tokio::test(start_paused = true)]
async fn test_failure_backs_off_twice_the_delay_and_last_record_does_not_sleep() {
    let extractor = StubExtractor::new(Duration::from_secs(1), 3, &["b"]);

    let start = Instant::now();
    let outcomes = extractor.extract_batch(ids(&["a", "b", "c"])).await;
    let elapsed = start.elapsed();

    // 1s after "a", 2s after the failed "b", nothing after "c"
    assert_eq!(elapsed, Duration::from_secs(3));
    assert_eq!(fetched_ids(&outcomes), vec!["a", "c"]);
    assert!(!outcomes[1].is_fetched());
}

#[tokio::test(start_paused = true)]
async fn test_failure_skips_back_off_once_budget_is_spent() {
    let extractor = StubExtractor::new(Duration::from_secs(1), 1, &["b", "c"]);

    let start = Instant::now();
    let outcomes = extractor.extract_batch(ids(&["a", "b", "c", "d"])).await;
    let elapsed = start.elapsed();

    // only the pause after "a"; one fetch already spends the budget
    assert_eq!(elapsed, Duration::from_secs(1));
    assert_eq!(outcomes.len(), 4);
    assert_eq!(fetched_ids(&outcomes), vec!["a", "d"]);
}

#[tokio::test(start_paused = true)]
async fn test_back_off_saturates_on_huge_delay() {
    let extractor = StubExtractor::new(Duration::MAX, 3, &["a"]);

    let batch = extractor.extract_batch(ids(&["a", "b"]));
    let result = tokio::time::timeout(Duration::from_secs(60), batch).await;

    assert!(result.is_err(), "batch should still be backing off");
    assert_eq!(extractor.calls(), vec!["a"]);
}
