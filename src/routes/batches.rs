//! Batch submission and status endpoints.

use crate::dispatch::{BatchDispatcher, BatchProgress, BatchStore};
use crate::error::ApiError;
use crate::models::{RecipientRecord, Template};
use rocket::State;
use rocket::response::status::Accepted;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for submitting a batch dispatch.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SubmitBatchRequest {
    /// Recipient records; each must carry an `email` field.
    pub recipients: Vec<RecipientRecord>,
    /// Message subject, may contain template tokens.
    pub subject: String,
    /// HTML body, may contain template tokens.
    #[serde(rename = "htmlBody")]
    pub html_body: String,
    /// Optional plain-text body.
    #[serde(rename = "textBody", default)]
    pub text_body: String,
    /// Optional sender display name shown in recipients' inboxes.
    #[serde(rename = "fromDisplayName")]
    pub from_display_name: Option<String>,
}

/// Response returned when a batch is accepted for dispatch.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SubmitBatchResponse {
    /// Identifier to poll the status endpoint with.
    #[serde(rename = "batchId")]
    pub batch_id: String,
}

/// Accept a recipient set and template for dispatch.
///
/// The response only acknowledges acceptance; the send work continues in
/// the background and is observable through the status endpoint.
#[openapi(tag = "Batches")]
#[post("/batches", data = "<request>")]
pub async fn submit_batch(
    request: Json<SubmitBatchRequest>,
    dispatcher: &State<Arc<BatchDispatcher>>,
) -> Result<Accepted<Json<SubmitBatchResponse>>, ApiError> {
    let request = request.into_inner();
    let template = Template {
        subject: request.subject,
        html_body: request.html_body,
        text_body: request.text_body,
        from_display_name: request.from_display_name,
    };

    let batch_id = dispatcher.start(request.recipients, template)?;

    Ok(Accepted(Json(SubmitBatchResponse { batch_id })))
}

/// Report progress for a batch.
///
/// Returns not-found for ids that were never issued or whose batch has
/// already been swept past the retention window.
#[openapi(tag = "Batches")]
#[get("/batches/<id>")]
pub async fn get_batch_status(
    id: String,
    store: &State<Arc<dyn BatchStore>>,
) -> Result<Json<BatchProgress>, ApiError> {
    match store.get(&id) {
        Some(batch) => Ok(Json(BatchProgress::project(&batch))),
        None => Err(ApiError::NotFound(format!("Batch '{}' not found", id))),
    }
}
