//! Delivery-provider interface consumed by the dispatch loop.

use serde::Serialize;
use thiserror::Error;

/// Sender identity applied to every message of a chunk.
#[derive(Debug, Clone, Serialize)]
pub struct Sender {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One fully rendered message, ready to hand to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Per-position reply from a provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted { message_id: String },
    Rejected { error: String },
}

/// Errors that can occur while talking to the delivery provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider fault: {0}")]
    Fault(String),
}

/// The one capability the engine needs from a delivery provider: up to the
/// chunk limit of rendered messages in, one outcome per input position out.
///
/// Implementations fold everything attributable to the chunk itself
/// (rejections, unreachable service, undecodable replies) into `Rejected`
/// outcomes. An `Err` means the call blew up rather than answering, which
/// the dispatch loop treats as fatal to the whole batch.
#[rocket::async_trait]
pub trait ProviderClient: Send + Sync {
    async fn send_batch(
        &self,
        sender: &Sender,
        messages: &[OutboundMessage],
    ) -> Result<Vec<SendOutcome>, ProviderError>;
}
