//! # contract: the interface between the pipeline and extractor backends
//!
//! The pipeline only ever talks to backends through the [`Extractor`] trait and
//! builds them through a [`BackendFactory`]. Both traits are annotated for
//! `mockall`, so tests can stand in a mock backend or assert that no backend
//! was ever constructed.
//!
//! ## Batch results
//! [`Extractor::extract_batch`] returns one [`ExtractionOutcome`] per record it
//! attempted, each carrying the record it came from. A failed request does not
//! shift later results onto the wrong record: the pipeline pairs payloads with
//! parameters through the outcome, never by position.
//!
//! ## Failure budget
//! The default batch runs every record in order and never stops early. After
//! a failed record it backs off for twice the usual delay, but only while
//! fewer than `max_retries` records have been fetched; past that point a
//! failure moves straight on to the next record.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info, warn};

use mockall::automock;

use crate::error::{ExtractionError, PipelineError};
use crate::factory::{ExtractorOptions, ExtractorType};
use crate::record::ParameterRecord;

/// Pacing and failure budget for a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchPolicy {
    /// Pause after each successful request.
    pub delay: Duration,
    /// A failure backs off for `2 * delay` while fewer than this many
    /// records have been fetched.
    pub max_retries: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_retries: 3,
        }
    }
}

/// Result of extracting one record.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub params: ParameterRecord,
    pub result: Result<String, ExtractionError>,
}

impl ExtractionOutcome {
    pub fn fetched(params: ParameterRecord, payload: impl Into<String>) -> Self {
        Self {
            params,
            result: Ok(payload.into()),
        }
    }

    pub fn failed(params: ParameterRecord, error: ExtractionError) -> Self {
        Self {
            params,
            result: Err(error),
        }
    }

    pub fn is_fetched(&self) -> bool {
        self.result.is_ok()
    }
}

/// A backend that performs extractions.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Perform a single extraction and return its payload.
    async fn extract(&self, params: &ParameterRecord) -> Result<String, ExtractionError>;

    /// Pacing used by the default [`extract_batch`](Self::extract_batch).
    fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy::default()
    }

    /// Extract every record in order, one outcome per record.
    async fn extract_batch(&self, params_list: Vec<ParameterRecord>) -> Vec<ExtractionOutcome> {
        let policy = self.batch_policy();
        let total = params_list.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut fetched = 0usize;
        let mut failures = 0usize;
        let mut pending = params_list.into_iter();

        while let Some(params) = pending.next() {
            let more = pending.len() > 0;
            match self.extract(&params).await {
                Ok(payload) => {
                    outcomes.push(ExtractionOutcome::fetched(params, payload));
                    fetched += 1;
                    if more {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, ?params, "[BATCH] Failed to extract");
                    outcomes.push(ExtractionOutcome::failed(params, e));
                    failures += 1;
                    if fetched >= policy.max_retries {
                        warn!(
                            fetched,
                            max_retries = policy.max_retries,
                            "[BATCH] Retry budget spent, continuing without back-off"
                        );
                    } else if more {
                        tokio::time::sleep(policy.delay.saturating_mul(2)).await;
                    }
                }
            }
        }

        info!(
            total,
            fetched,
            failures,
            "[BATCH] Batch extraction finished"
        );
        outcomes
    }
}

/// Builds backends from a type and its options.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait BackendFactory: Send + Sync {
    fn create(
        &self,
        extractor_type: ExtractorType,
        options: &ExtractorOptions,
    ) -> Result<Box<dyn Extractor>, PipelineError>;
}
