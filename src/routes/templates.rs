//! Template preview endpoint for composing operators.

use crate::dispatch::{template, validator};
use crate::models::RecipientRecord;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

/// Request body for previewing a template against one sample record.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PreviewRequest {
    pub subject: String,
    #[serde(rename = "htmlBody")]
    pub html_body: String,
    #[serde(rename = "textBody", default)]
    pub text_body: String,
    /// Sample recipient record to resolve tokens against.
    pub record: RecipientRecord,
}

/// Rendered preview plus everything the operator should fix before
/// dispatching.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PreviewResponse {
    pub subject: String,
    #[serde(rename = "htmlBody")]
    pub html_body: String,
    #[serde(rename = "textBody")]
    pub text_body: String,
    /// Token names that would remain unresolved for this record.
    #[serde(rename = "unresolvedTokens")]
    pub unresolved_tokens: Vec<String>,
    /// Whether the record's email passes the same check dispatch uses.
    #[serde(rename = "emailValid")]
    pub email_valid: bool,
}

/// Render a template against a sample record.
///
/// Uses the exact renderer and validator the dispatcher uses, so a record
/// that previews cleanly is guaranteed to be accepted at send time.
#[openapi(tag = "Templates")]
#[post("/templates/preview", data = "<request>")]
pub fn preview_template(request: Json<PreviewRequest>) -> Json<PreviewResponse> {
    let request = request.into_inner();

    let mut unresolved = Vec::new();
    for text in [&request.subject, &request.html_body, &request.text_body] {
        for name in template::unresolved_tokens(text, &request.record) {
            if !unresolved.contains(&name) {
                unresolved.push(name);
            }
        }
    }

    let email_valid = request
        .record
        .email()
        .map(validator::is_valid_email)
        .unwrap_or(false);

    Json(PreviewResponse {
        subject: template::render(&request.subject, &request.record),
        html_body: template::render(&request.html_body, &request.record),
        text_body: template::render(&request.text_body, &request.record),
        unresolved_tokens: unresolved,
        email_valid,
    })
}
