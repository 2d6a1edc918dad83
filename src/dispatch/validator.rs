//! Structural email validation.
//!
//! One routine serves both preview and dispatch filtering, so a recipient
//! accepted at preview time is guaranteed to be accepted at send time.

use regex::Regex;
use std::sync::OnceLock;

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> &'static Regex {
    EMAIL_PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

/// Structural `local@domain.tld` check. Deliberately not full RFC 5322:
/// the provider makes the final call, this only filters obvious garbage.
pub fn is_valid_email(candidate: &str) -> bool {
    email_pattern().is_match(candidate)
}
