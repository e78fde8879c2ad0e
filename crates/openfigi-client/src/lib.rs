//! OpenFIGI enrichment
//!
//! Confirms checksum-valid ISINs against the OpenFIGI mapping service and
//! attaches security metadata. Every call resolves to an `IdentifierRecord`;
//! lookup failures become low-confidence fallback records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod cache;
pub mod client;
pub mod config;
pub mod enrichment;


pub use cache::{CacheError, IdentifierCache, InMemoryIdentifierCache};
pub use client::OpenFigiClient;
pub use config::{BatchPolicy, EnrichmentConfig, RetryPolicy};
pub use enrichment::IdentifierEnrichmentClient;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Rate limited by lookup service")]
    RateLimited,

    #[error("Lookup timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Flattened first match of a mapping job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    /// The service returned at least one match
    pub found: bool,
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub exchange_code: Option<String>,
    pub market_sector: Option<String>,
    pub security_type: Option<String>,
    /// Job-level error reported by the service
    pub error: Option<String>,
}

impl LookupResponse {
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// Security metadata source keyed by ISIN
#[async_trait]
pub trait SecurityLookup: Send + Sync {
    async fn lookup(&self, code: &str) -> Result<LookupResponse, LookupError>;
}
