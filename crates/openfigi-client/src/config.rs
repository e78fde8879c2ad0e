use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openfigi.com";

/// Retry behaviour for a single lookup
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts made while the service answers "rate limited"
    pub max_attempts: u32,
    /// Per-attempt timeout; a timeout is never retried
    pub timeout: Duration,
    /// Wait after attempt `n` (0-based) is `backoff_base * 2^n`
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(5),
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// How batches are split and paced
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPolicy {
    /// Lookups running concurrently in one batch
    pub batch_size: usize,
    /// Pause between consecutive batches
    pub delay_between_batches: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay_between_batches: Duration::from_millis(250),
        }
    }
}

/// Enrichment settings read from the environment
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Requests per second allowed by the client-side limiter
    pub rate_limit: usize,
    pub cache_ttl: Duration,
    pub retry: RetryPolicy,
    pub batch: BatchPolicy,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit: 25,
            cache_ttl: Duration::from_secs(7 * 24 * 3600),
            retry: RetryPolicy::default(),
            batch: BatchPolicy::default(),
        }
    }
}

impl EnrichmentConfig {
    /// `OPENFIGI_API_KEY`, `OPENFIGI_BASE_URL`, `OPENFIGI_TIMEOUT_SECS`,
    /// `OPENFIGI_RATE_LIMIT` and `ISIN_CACHE_TTL_DAYS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = std::env::var("OPENFIGI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let base_url = std::env::var("OPENFIGI_BASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(defaults.base_url);
        let timeout = std::env::var("OPENFIGI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry.timeout);
        let rate_limit = std::env::var("OPENFIGI_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.rate_limit);
        let cache_ttl = std::env::var("ISIN_CACHE_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|days| Duration::from_secs(days * 24 * 3600))
            .unwrap_or(defaults.cache_ttl);

        Self {
            api_key,
            base_url,
            rate_limit,
            cache_ttl,
            retry: RetryPolicy {
                timeout,
                ..defaults.retry
            },
            batch: defaults.batch,
        }
    }
}
