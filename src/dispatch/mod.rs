//! Batch dispatch and status tracking engine.
//!
//! This module is the core of the service: it takes a validated recipient
//! set and a message template, splits the set into provider-sized chunks,
//! personalizes each message, paces delivery against the provider's rate
//! limit, and records per-recipient outcomes for a polling client.
//!
//! ## Core Components
//!
//! - **`dispatcher`**: Orchestrates chunking, rendering, provider calls,
//!   pacing, and result aggregation. Sole writer to a batch's store entry.
//!
//! - **`store`**: Keyed batch storage behind an injected interface with an
//!   in-memory implementation. Updates are atomic per batch id.
//!
//! - **`template`**: Resolves `{{variable}}` / `{{variable|fallback}}`
//!   tokens against a recipient record.
//!
//! - **`validator`**: Structural email validation, shared by preview and
//!   dispatch filtering so both always agree.
//!
//! - **`provider`**: The delivery capability the engine consumes, plus the
//!   `client` HTTP adapter that normalizes the provider's reply shapes.
//!
//! - **`reporter`**: Read-only projection of a stored batch into the
//!   progress summary served to pollers.
//!
//! - **`sweeper`**: Periodic removal of batches past the retention window.
//!
//! ## Data Flow
//!
//! 1. **Submit**: `BatchDispatcher::start` validates the request, creates
//!    the batch record, and returns its id immediately
//! 2. **Chunking**: recipients are partitioned into ordered chunks of at
//!    most the provider's per-call limit
//! 3. **Delivery**: each chunk is rendered, sent, and mapped back to
//!    recipients by position, sequentially with a pacing delay in between
//! 4. **Tracking**: outcomes are appended to the store per chunk; pollers
//!    read snapshots concurrently
//! 5. **Retirement**: the sweeper drops batches past the retention window

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod provider;
pub mod reporter;
pub mod store;
pub mod sweeper;
pub mod template;
pub mod validator;

pub use client::HttpProviderClient;
pub use config::{DispatchConfig, ProviderConfig};
pub use dispatcher::BatchDispatcher;
pub use provider::{OutboundMessage, ProviderClient, ProviderError, SendOutcome, Sender};
pub use reporter::BatchProgress;
pub use store::{BatchStore, InMemoryBatchStore};
pub use sweeper::RetentionSweeper;

use thiserror::Error;

/// Faults surfaced by the dispatch engine.
///
/// `Validation` is returned synchronously to the submitter before any batch
/// record exists. The remaining variants occur inside the background loop,
/// where they terminate the batch as `Failed`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),
    #[error("batch {0} is no longer in the store")]
    BatchMissing(String),
    #[error("provider call failed: {0}")]
    Provider(#[from] ProviderError),
}
