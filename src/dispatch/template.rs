//! Template token rendering against recipient records.
//!
//! Tokens take the form `{{name}}` or `{{name|fallback}}`. Resolution is a
//! single pass: substituted values are never re-scanned, and a token that
//! resolves to nothing is left literally in the output rather than raising
//! an error, so callers can see exactly which fields were missing.

use crate::models::RecipientRecord;
use regex::{Captures, Regex};
use std::sync::OnceLock;

static TOKEN_PATTERN: OnceLock<Regex> = OnceLock::new();

fn token_pattern() -> &'static Regex {
    TOKEN_PATTERN
        .get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("token pattern compiles"))
}

/// Render `text` against `record`, substituting every resolvable token.
///
/// Pure function of its inputs. Unresolved tokens (absent or empty field,
/// no fallback) stay in the output verbatim, which makes re-rendering the
/// result with the same record a no-op.
pub fn render(text: &str, record: &RecipientRecord) -> String {
    token_pattern()
        .replace_all(text, |caps: &Captures| {
            resolve_token(&caps[0], &caps[1], record)
        })
        .into_owned()
}

/// Token names in `text` that `render` would leave unresolved.
///
/// Duplicates are reported once, in first-appearance order.
pub fn unresolved_tokens(text: &str, record: &RecipientRecord) -> Vec<String> {
    let mut names = Vec::new();
    for caps in token_pattern().captures_iter(text) {
        let (name, fallback) = split_token_body(&caps[1]);
        let resolvable = matches!(record.field(name), Some(value) if !value.is_empty());
        if !resolvable && fallback.is_none() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn resolve_token(original: &str, body: &str, record: &RecipientRecord) -> String {
    let (name, fallback) = split_token_body(body);

    match record.field(name) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => match fallback {
            Some(fallback) => strip_quotes(fallback).to_string(),
            None => original.to_string(),
        },
    }
}

/// Split on the first `|`, trimming both sides.
fn split_token_body(body: &str) -> (&str, Option<&str>) {
    match body.split_once('|') {
        Some((name, fallback)) => (name.trim(), Some(fallback.trim())),
        None => (body.trim(), None),
    }
}

/// Strip one matching pair of surrounding single or double quotes.
fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
