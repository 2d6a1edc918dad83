use std::env;
use std::time::Duration;

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

fn env_duration_secs(key: &str, default_secs: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Runtime configuration for the dispatch engine.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum messages per provider call.
    pub chunk_size: usize,
    /// Maximum recipients accepted in one submission.
    pub max_recipients: usize,
    /// Fixed delay inserted between consecutive chunk calls.
    pub chunk_pacing: Duration,
    /// Sender address applied to every outgoing message. Submissions are
    /// rejected while this is unset.
    pub from_email: Option<String>,
    /// Default sender display name, overridable per template.
    pub from_name: Option<String>,
    /// Age past which a batch record becomes eligible for removal.
    pub retention: Duration,
    /// How often the sweeper looks for expired batches.
    pub sweep_interval: Duration,
}

impl DispatchConfig {
    pub fn from_env() -> Self {
        Self {
            chunk_size: env_usize("DISPATCH_CHUNK_SIZE", 100),
            max_recipients: env_usize("DISPATCH_MAX_RECIPIENTS", 1000),
            chunk_pacing: env_duration_millis("DISPATCH_CHUNK_PACING_MS", 1_000),
            from_email: env_string_opt("DISPATCH_FROM_EMAIL"),
            from_name: env_string_opt("DISPATCH_FROM_NAME"),
            retention: env_duration_secs("DISPATCH_RETENTION_SECS", 24 * 60 * 60),
            sweep_interval: env_duration_secs("DISPATCH_SWEEP_INTERVAL_SECS", 15 * 60),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Configuration for the delivery-provider HTTP client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("PROVIDER_BASE_URL", "http://provider:8080"),
            api_key: env_string_opt("PROVIDER_API_KEY"),
            request_timeout: env_duration_millis("PROVIDER_TIMEOUT_MS", 30_000),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
