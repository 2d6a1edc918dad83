//! HTTP adapter for the delivery provider.
//!
//! The provider's batch endpoint answers in one of three shapes: a flat
//! list of per-message results, the same list nested under `results`, or a
//! single bare object. All of them are normalized here, once, into one
//! outcome per input position; the dispatch loop never branches on reply
//! shape. When normalization cannot attribute outcomes positionally, the
//! whole chunk is failed with the provider's top-level error instead of
//! guessing.

use super::config::ProviderConfig;
use super::provider::{OutboundMessage, ProviderClient, ProviderError, SendOutcome, Sender};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GENERIC_FAILURE: &str = "email delivery failed";

#[derive(Clone)]
pub struct HttpProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl HttpProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("dispatch-server/0.1")
            .build()
            .map_err(ProviderError::Http)?;

        Ok(Self {
            http: client,
            config,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[rocket::async_trait]
impl ProviderClient for HttpProviderClient {
    async fn send_batch(
        &self,
        sender: &Sender,
        messages: &[OutboundMessage],
    ) -> Result<Vec<SendOutcome>, ProviderError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let endpoint = format!(
            "{}/v1/messages/batch",
            self.config.base_url.trim_end_matches('/')
        );
        let payload = SendBatchRequest {
            from: sender,
            messages,
        };

        let mut request = self.http.post(&endpoint).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                log::warn!("provider request failed: {}", err);
                return Ok(chunk_failure(
                    messages.len(),
                    format!("provider request failed: {err}"),
                ));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::warn!("provider returned status {}: {}", status, body);
            let error = top_level_error(&body)
                .unwrap_or_else(|| format!("provider returned status {status}"));
            return Ok(chunk_failure(messages.len(), error));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                log::warn!("provider reply unreadable: {}", err);
                return Ok(chunk_failure(
                    messages.len(),
                    format!("provider reply unreadable: {err}"),
                ));
            }
        };

        match serde_json::from_str::<SendBatchResponse>(&body) {
            Ok(parsed) => Ok(normalize(parsed, messages.len())),
            Err(err) => {
                log::warn!("undecodable provider reply: {}", err);
                Ok(chunk_failure(
                    messages.len(),
                    format!("undecodable provider reply: {err}"),
                ))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct SendBatchRequest<'a> {
    from: &'a Sender,
    messages: &'a [OutboundMessage],
}

#[derive(Debug, Deserialize)]
struct SendResult {
    #[serde(rename = "messageId")]
    message_id: Option<String>,
    error: Option<String>,
}

/// Reply shapes the provider is known to produce. Order matters: `Single`
/// has only optional fields and would otherwise swallow everything.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SendBatchResponse {
    Flat(Vec<SendResult>),
    Nested { results: Vec<SendResult> },
    Single(SendResult),
}

/// Collapse a reply into exactly one outcome per input position.
fn normalize(response: SendBatchResponse, expected: usize) -> Vec<SendOutcome> {
    match response {
        SendBatchResponse::Flat(results) | SendBatchResponse::Nested { results } => {
            if results.len() == expected {
                results.into_iter().map(to_outcome).collect()
            } else {
                chunk_failure(
                    expected,
                    format!(
                        "provider returned {} outcomes for {} messages",
                        results.len(),
                        expected
                    ),
                )
            }
        }
        SendBatchResponse::Single(result) => {
            if expected == 1 {
                vec![to_outcome(result)]
            } else {
                let error = result.error.unwrap_or_else(|| {
                    "provider returned a single outcome for a multi-message chunk".to_string()
                });
                chunk_failure(expected, error)
            }
        }
    }
}

fn to_outcome(result: SendResult) -> SendOutcome {
    match result.message_id {
        Some(message_id) => SendOutcome::Accepted { message_id },
        None => SendOutcome::Rejected {
            error: result.error.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        },
    }
}

fn chunk_failure(len: usize, error: String) -> Vec<SendOutcome> {
    vec![SendOutcome::Rejected { error }; len]
}

/// Pull the provider's top-level `error` field out of an error body.
fn top_level_error(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> SendBatchResponse {
        serde_json::from_str(body).expect("reply parses")
    }

    #[test]
    fn flat_list_maps_by_position() {
        let reply = parse(r#"[{"messageId":"m-1"},{"error":"bounced"}]"#);
        let outcomes = normalize(reply, 2);
        assert_eq!(
            outcomes,
            vec![
                SendOutcome::Accepted {
                    message_id: "m-1".to_string()
                },
                SendOutcome::Rejected {
                    error: "bounced".to_string()
                },
            ]
        );
    }

    #[test]
    fn nested_list_maps_by_position() {
        let reply = parse(r#"{"results":[{"messageId":"m-1"},{"messageId":"m-2"}]}"#);
        let outcomes = normalize(reply, 2);
        assert!(matches!(outcomes[1], SendOutcome::Accepted { .. }));
    }

    #[test]
    fn single_object_maps_to_single_message_chunk() {
        let reply = parse(r#"{"messageId":"m-9"}"#);
        assert_eq!(
            normalize(reply, 1),
            vec![SendOutcome::Accepted {
                message_id: "m-9".to_string()
            }]
        );
    }

    #[test]
    fn single_object_fails_whole_multi_message_chunk() {
        let reply = parse(r#"{"error":"invalid api key"}"#);
        let outcomes = normalize(reply, 3);
        assert_eq!(outcomes.len(), 3);
        for outcome in outcomes {
            assert_eq!(
                outcome,
                SendOutcome::Rejected {
                    error: "invalid api key".to_string()
                }
            );
        }
    }

    #[test]
    fn count_mismatch_fails_whole_chunk() {
        let reply = parse(r#"[{"messageId":"m-1"}]"#);
        let outcomes = normalize(reply, 2);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, SendOutcome::Rejected { .. })));
    }

    #[test]
    fn missing_id_and_error_falls_back_to_generic_text() {
        let reply = parse(r#"[{}]"#);
        assert_eq!(
            normalize(reply, 1),
            vec![SendOutcome::Rejected {
                error: GENERIC_FAILURE.to_string()
            }]
        );
    }

    #[test]
    fn top_level_error_is_extracted_from_error_bodies() {
        assert_eq!(
            top_level_error(r#"{"error":"rate limited"}"#).as_deref(),
            Some("rate limited")
        );
        assert!(top_level_error("not json").is_none());
        assert!(top_level_error(r#"{"message":"x"}"#).is_none());
    }
}
