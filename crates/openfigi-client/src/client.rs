use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::EnrichmentConfig;
use crate::{LookupError, LookupResponse, SecurityLookup};

const MAPPING_PATH: &str = "/v3/mapping";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub(crate) async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            let oldest = match ts.front().copied() {
                Some(oldest) if ts.len() >= self.max_requests => oldest,
                _ => {
                    ts.push_back(now);
                    return;
                }
            };

            // Wait for the oldest request to leave the window
            let sleep_dur = (oldest + self.window).duration_since(now);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {}ms for OpenFIGI slot", sleep_dur.as_millis());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Debug, Serialize)]
struct MappingJob<'a> {
    #[serde(rename = "idType")]
    id_type: &'a str,
    #[serde(rename = "idValue")]
    id_value: &'a str,
}

#[derive(Debug, Deserialize)]
struct MappingResult {
    #[serde(default)]
    data: Option<Vec<MappingInstrument>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MappingInstrument {
    name: Option<String>,
    ticker: Option<String>,
    exch_code: Option<String>,
    market_sector: Option<String>,
    security_type: Option<String>,
    security_type2: Option<String>,
}

impl From<MappingResult> for LookupResponse {
    fn from(result: MappingResult) -> Self {
        if let Some(error) = result.error {
            return LookupResponse {
                error: Some(error),
                ..LookupResponse::default()
            };
        }

        match result.data.and_then(|data| data.into_iter().next()) {
            Some(first) => LookupResponse {
                found: true,
                name: first.name,
                ticker: first.ticker,
                exchange_code: first.exch_code,
                market_sector: first.market_sector,
                security_type: first.security_type.or(first.security_type2),
                error: None,
            },
            None => LookupResponse::not_found(),
        }
    }
}

/// HTTP client for the OpenFIGI mapping endpoint
#[derive(Clone)]
pub struct OpenFigiClient {
    api_key: Option<String>,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl OpenFigiClient {
    pub fn new(config: &EnrichmentConfig) -> Self {
        // The per-lookup timeout is enforced by the enrichment client; this
        // one only bounds a stuck connection.
        let client = Client::builder()
            .timeout(config.retry.timeout * 2)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            rate_limiter: RateLimiter::new(config.rate_limit, Duration::from_secs(1)),
        }
    }

    pub fn from_env() -> Self {
        Self::new(&EnrichmentConfig::from_env())
    }

    fn mapping_url(&self) -> String {
        format!("{}{}", self.base_url, MAPPING_PATH)
    }
}

#[async_trait]
impl SecurityLookup for OpenFigiClient {
    async fn lookup(&self, code: &str) -> Result<LookupResponse, LookupError> {
        self.rate_limiter.acquire().await;

        let jobs = [MappingJob {
            id_type: "ID_ISIN",
            id_value: code,
        }];
        let mut request = self.client.post(self.mapping_url()).json(&jobs);
        if let Some(key) = &self.api_key {
            request = request.header("X-OPENFIGI-APIKEY", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LookupError::Timeout
            } else {
                LookupError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("OpenFIGI 429 rate limited for {}", code);
            return Err(LookupError::RateLimited);
        }
        if !status.is_success() {
            return Err(LookupError::Http(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let results: Vec<MappingResult> = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;

        results
            .into_iter()
            .next()
            .map(LookupResponse::from)
            .ok_or_else(|| LookupError::Decode("empty mapping response".to_string()))
    }
}
