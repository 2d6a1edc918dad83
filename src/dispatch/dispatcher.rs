//! Batch orchestration: chunking, rendering, provider calls, pacing, and
//! result aggregation.
//!
//! `start` validates and answers synchronously; the actual send work runs
//! in a spawned task whose progress is observable only through the batch
//! store. Chunks within one batch are strictly sequential so a single
//! rate-limited provider channel is never hit in parallel, while separate
//! batches each get their own independent loop.

use crate::dispatch::DispatchError;
use crate::dispatch::config::DispatchConfig;
use crate::dispatch::provider::{OutboundMessage, ProviderClient, SendOutcome, Sender};
use crate::dispatch::store::BatchStore;
use crate::dispatch::{template, validator};
use crate::models::{Batch, EmailOutcome, RecipientRecord, Template};
use std::sync::Arc;
use uuid::Uuid;

pub struct BatchDispatcher {
    store: Arc<dyn BatchStore>,
    provider: Arc<dyn ProviderClient>,
    config: DispatchConfig,
}

impl BatchDispatcher {
    pub fn new(
        store: Arc<dyn BatchStore>,
        provider: Arc<dyn ProviderClient>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Validate the submission, create the batch record, and launch the
    /// chunk loop. Returns the new batch id as soon as the record exists;
    /// delivery continues after the caller has its answer.
    ///
    /// Validation failures reject the submission before any record is
    /// created.
    pub fn start(
        &self,
        recipients: Vec<RecipientRecord>,
        template: Template,
    ) -> Result<String, DispatchError> {
        if recipients.is_empty() {
            return Err(DispatchError::Validation(
                "recipient list is empty".to_string(),
            ));
        }
        if recipients.len() > self.config.max_recipients {
            return Err(DispatchError::Validation(format!(
                "recipient list exceeds the {} recipient limit",
                self.config.max_recipients
            )));
        }
        if template.subject.trim().is_empty() {
            return Err(DispatchError::Validation("subject is required".to_string()));
        }
        if template.html_body.trim().is_empty() {
            return Err(DispatchError::Validation(
                "htmlBody is required".to_string(),
            ));
        }
        let from_email = self.config.from_email.clone().ok_or_else(|| {
            DispatchError::Validation("no sender address is configured".to_string())
        })?;

        // Same validator the preview endpoint uses, so nothing accepted at
        // preview time gets dropped here.
        let submitted = recipients.len();
        let admitted: Vec<RecipientRecord> = recipients
            .into_iter()
            .filter(|record| {
                record
                    .email()
                    .map(validator::is_valid_email)
                    .unwrap_or(false)
            })
            .collect();

        if admitted.is_empty() {
            return Err(DispatchError::Validation(
                "no recipients with a valid email address".to_string(),
            ));
        }
        if admitted.len() < submitted {
            log::warn!(
                "dropping {} of {} recipients with invalid email addresses",
                submitted - admitted.len(),
                submitted
            );
        }

        let sender = Sender {
            email: from_email,
            name: template
                .from_display_name
                .clone()
                .or_else(|| self.config.from_name.clone()),
        };

        let id = Uuid::new_v4().to_string();
        self.store.create(Batch::new(id.clone(), admitted.len()));
        log::info!("batch {}: created with {} recipients", id, admitted.len());

        let store = Arc::clone(&self.store);
        let provider = Arc::clone(&self.provider);
        let config = self.config.clone();
        let batch_id = id.clone();
        tokio::spawn(async move {
            run_batch(store, provider, config, batch_id, admitted, template, sender).await;
        });

        Ok(id)
    }
}

/// Background loop for one batch. Applies the terminal transition exactly
/// once: `Completed` on normal exhaustion of all chunks, `Failed` on an
/// unrecovered fault, keeping whatever partial results were appended.
async fn run_batch(
    store: Arc<dyn BatchStore>,
    provider: Arc<dyn ProviderClient>,
    config: DispatchConfig,
    id: String,
    recipients: Vec<RecipientRecord>,
    template: Template,
    sender: Sender,
) {
    match process_chunks(
        store.as_ref(),
        provider.as_ref(),
        &config,
        &id,
        &recipients,
        &template,
        &sender,
    )
    .await
    {
        Ok(()) => {
            if store.update(&id, &mut |batch| batch.complete()) {
                log::info!("batch {}: completed", id);
            } else {
                log::warn!("batch {}: swept before completion could be recorded", id);
            }
        }
        Err(err) => {
            log::error!("batch {}: dispatch failed: {}", id, err);
            store.update(&id, &mut |batch| batch.fail(err.to_string()));
        }
    }
}

async fn process_chunks(
    store: &dyn BatchStore,
    provider: &dyn ProviderClient,
    config: &DispatchConfig,
    id: &str,
    recipients: &[RecipientRecord],
    template: &Template,
    sender: &Sender,
) -> Result<(), DispatchError> {
    let chunk_size = config.chunk_size.max(1);
    let chunk_count = recipients.len().div_ceil(chunk_size);

    for (index, chunk) in recipients.chunks(chunk_size).enumerate() {
        log::debug!(
            "batch {}: sending chunk {}/{} ({} messages)",
            id,
            index + 1,
            chunk_count,
            chunk.len()
        );

        let messages: Vec<OutboundMessage> = chunk
            .iter()
            .map(|record| render_message(record, template))
            .collect();

        // A provider error value is a chunk-level result and never aborts
        // the batch; only an Err escaping here is fatal.
        let replies = provider.send_batch(sender, &messages).await?;
        let outcomes = map_outcomes(chunk, replies);

        let mut pending = Some(outcomes);
        let appended = store.update(id, &mut |batch| {
            if let Some(outcomes) = pending.take() {
                batch.record_chunk(outcomes);
            }
        });
        if !appended {
            return Err(DispatchError::BatchMissing(id.to_string()));
        }

        if index + 1 < chunk_count {
            tokio::time::sleep(config.chunk_pacing).await;
        }
    }

    Ok(())
}

fn render_message(record: &RecipientRecord, template: &Template) -> OutboundMessage {
    OutboundMessage {
        to: record.email().unwrap_or_default().to_string(),
        subject: template::render(&template.subject, record),
        html: template::render(&template.html_body, record),
        text: template::render(&template.text_body, record),
    }
}

/// Map provider replies back to recipients strictly by position. When the
/// counts disagree the whole chunk is failed rather than guessing which
/// reply belongs to whom.
fn map_outcomes(chunk: &[RecipientRecord], replies: Vec<SendOutcome>) -> Vec<EmailOutcome> {
    if replies.len() != chunk.len() {
        let error = format!(
            "provider returned {} outcomes for {} messages",
            replies.len(),
            chunk.len()
        );
        return chunk
            .iter()
            .map(|record| EmailOutcome::failed(record.email().unwrap_or_default(), error.clone()))
            .collect();
    }

    chunk
        .iter()
        .zip(replies)
        .map(|(record, reply)| {
            let email = record.email().unwrap_or_default();
            match reply {
                SendOutcome::Accepted { message_id } => EmailOutcome::success(email, message_id),
                SendOutcome::Rejected { error } => EmailOutcome::failed(email, error),
            }
        })
        .collect()
}
