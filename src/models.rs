use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ===== Recipient & Template Models =====

/// A single recipient: personalization fields keyed by name.
///
/// Records are immutable once submitted. A record must carry an `email`
/// field to be dispatchable; everything else is template material.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RecipientRecord(pub HashMap<String, String>);

impl RecipientRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// The recipient address, if the record has one.
    pub fn email(&self) -> Option<&str> {
        self.field("email")
    }
}

impl<const N: usize> From<[(&str, &str); N]> for RecipientRecord {
    fn from(fields: [(&str, &str); N]) -> Self {
        Self(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Message template applied to every recipient of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Template {
    pub subject: String,
    #[serde(rename = "htmlBody")]
    pub html_body: String,
    #[serde(rename = "textBody", default)]
    pub text_body: String,
    #[serde(rename = "fromDisplayName")]
    pub from_display_name: Option<String>,
}

// ===== Batch Models =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// Per-recipient delivery result, appended in submission order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmailOutcome {
    pub email: String,
    pub status: OutcomeStatus,
    #[serde(rename = "providerMessageId", skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmailOutcome {
    pub fn success(email: impl Into<String>, provider_message_id: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            status: OutcomeStatus::Success,
            provider_message_id: Some(provider_message_id.into()),
            error: None,
        }
    }

    pub fn failed(email: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            status: OutcomeStatus::Failed,
            provider_message_id: None,
            error: Some(error.into()),
        }
    }
}

/// One dispatch run covering one template against one recipient set.
///
/// Owned exclusively by the dispatch loop while `Processing`; status readers
/// only ever see cloned snapshots. `success_count + failure_count` equals
/// `results.len()` at every point in the batch's life.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Batch {
    pub id: String,
    pub status: BatchStatus,
    pub results: Vec<EmailOutcome>,
    #[serde(rename = "successCount")]
    pub success_count: usize,
    #[serde(rename = "failureCount")]
    pub failure_count: usize,
    /// Number of recipients admitted to dispatch.
    pub total: usize,
    /// Batch-level fault message; only set when the pipeline itself broke.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(id: impl Into<String>, total: usize) -> Self {
        Self {
            id: id.into(),
            status: BatchStatus::Processing,
            results: Vec::new(),
            success_count: 0,
            failure_count: 0,
            total,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, BatchStatus::Completed | BatchStatus::Failed)
    }

    /// Append one chunk's outcomes, keeping the counters in lockstep.
    pub fn record_chunk(&mut self, outcomes: Vec<EmailOutcome>) {
        for outcome in &outcomes {
            match outcome.status {
                OutcomeStatus::Success => self.success_count += 1,
                OutcomeStatus::Failed => self.failure_count += 1,
            }
        }
        self.results.extend(outcomes);
    }

    /// Terminal transition on normal exhaustion of all chunks.
    pub fn complete(&mut self) {
        self.status = BatchStatus::Completed;
    }

    /// Terminal transition on an unrecovered fault. Partial results stay.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = BatchStatus::Failed;
        self.error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_chunk_keeps_counts_in_lockstep() {
        let mut batch = Batch::new("b-1", 3);
        batch.record_chunk(vec![
            EmailOutcome::success("a@example.com", "id-1"),
            EmailOutcome::failed("b@example.com", "mailbox full"),
        ]);
        batch.record_chunk(vec![EmailOutcome::success("c@example.com", "id-2")]);

        assert_eq!(batch.success_count, 2);
        assert_eq!(batch.failure_count, 1);
        assert_eq!(
            batch.success_count + batch.failure_count,
            batch.results.len()
        );
    }

    #[test]
    fn failing_preserves_partial_results() {
        let mut batch = Batch::new("b-2", 10);
        batch.record_chunk(vec![EmailOutcome::success("a@example.com", "id-1")]);
        batch.fail("provider hung up");

        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.results.len(), 1);
        assert_eq!(batch.error.as_deref(), Some("provider hung up"));
        assert!(batch.is_terminal());
    }
}
