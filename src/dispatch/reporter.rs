//! Read-only projection of a stored batch for polling clients.

use crate::models::{Batch, BatchStatus, EmailOutcome};
use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Progress summary answered by the status endpoint.
///
/// A `failed` status with a batch-level `error` means the pipeline itself
/// broke mid-flight and some recipients may have no recorded outcome at
/// all; that is distinct from `completed` with a nonzero failure count.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchProgress {
    pub status: BatchStatus,
    pub results: Vec<EmailOutcome>,
    #[serde(rename = "successCount")]
    pub success_count: usize,
    #[serde(rename = "failureCount")]
    pub failure_count: usize,
    /// Share of admitted recipients with a recorded outcome, 0-100.
    #[serde(rename = "progressPercent")]
    pub progress_percent: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl BatchProgress {
    pub fn project(batch: &Batch) -> Self {
        let processed = batch.success_count + batch.failure_count;
        let progress_percent = if batch.total == 0 {
            0
        } else {
            ((processed as f64 / batch.total as f64) * 100.0).round() as u32
        };

        Self {
            status: batch.status,
            results: batch.results.clone(),
            success_count: batch.success_count,
            failure_count: batch.failure_count,
            progress_percent,
            error: batch.error.clone(),
            created_at: batch.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_with_outcomes(total: usize, successes: usize, failures: usize) -> Batch {
        let mut batch = Batch::new("b-1", total);
        let mut outcomes = Vec::new();
        for i in 0..successes {
            outcomes.push(EmailOutcome::success(format!("s{i}@example.com"), "id"));
        }
        for i in 0..failures {
            outcomes.push(EmailOutcome::failed(format!("f{i}@example.com"), "nope"));
        }
        batch.record_chunk(outcomes);
        batch
    }

    #[test]
    fn progress_reflects_processed_share_of_total() {
        let batch = batch_with_outcomes(150, 100, 0);
        let progress = BatchProgress::project(&batch);
        assert_eq!(progress.progress_percent, 67);
        assert_eq!(progress.success_count, 100);
    }

    #[test]
    fn fresh_batch_reports_zero_progress() {
        let batch = Batch::new("b-2", 10);
        assert_eq!(BatchProgress::project(&batch).progress_percent, 0);
    }

    #[test]
    fn exhausted_batch_reports_full_progress() {
        let mut batch = batch_with_outcomes(4, 3, 1);
        batch.complete();
        let progress = BatchProgress::project(&batch);
        assert_eq!(progress.progress_percent, 100);
        assert_eq!(
            progress.success_count + progress.failure_count,
            progress.results.len()
        );
    }
}
