use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fiscal_core::{IdentifierRecord, LookupSource};
use futures_util::future::join_all;
use identifier_validator::{eligibility, inspect};

use crate::cache::{IdentifierCache, InMemoryIdentifierCache};
use crate::client::OpenFigiClient;
use crate::config::{BatchPolicy, EnrichmentConfig, RetryPolicy};
use crate::{LookupError, LookupResponse, SecurityLookup};

const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Validates identifiers offline, then confirms them through a cached lookup.
pub struct IdentifierEnrichmentClient {
    lookup: Arc<dyn SecurityLookup>,
    cache: Arc<dyn IdentifierCache>,
    retry: RetryPolicy,
    batch: BatchPolicy,
}

impl IdentifierEnrichmentClient {
    pub fn new(
        lookup: Arc<dyn SecurityLookup>,
        cache: Arc<dyn IdentifierCache>,
        retry: RetryPolicy,
        batch: BatchPolicy,
    ) -> Self {
        Self {
            lookup,
            cache,
            retry,
            batch,
        }
    }

    /// OpenFIGI lookup behind an in-memory cache, configured from `config`.
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self::new(
            Arc::new(OpenFigiClient::new(config)),
            Arc::new(InMemoryIdentifierCache::new(config.cache_ttl)),
            config.retry.clone(),
            config.batch.clone(),
        )
    }

    /// Enrich one identifier. Never fails: problems are reported through
    /// `confidence`, `source` and `warning`.
    pub async fn enrich(&self, code: &str) -> IdentifierRecord {
        let base = inspect(code);
        if !base.is_checksum_valid {
            return base;
        }

        match self.cache.get(&base.code).await {
            Ok(Some(mut cached)) => {
                tracing::debug!("Cache hit for {}", base.code);
                cached.source = LookupSource::Cache;
                return cached;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Identifier cache read failed for {}: {}", base.code, e),
        }

        for attempt in 0..self.retry.max_attempts {
            let outcome = tokio::time::timeout(self.retry.timeout, self.lookup.lookup(&base.code)).await;

            match outcome {
                Ok(Ok(response)) => {
                    let record = from_lookup(base, response);
                    if record.is_positive() {
                        if let Err(e) = self.cache.set(&record.code, &record).await {
                            tracing::warn!("Identifier cache write failed for {}: {}", record.code, e);
                        }
                    }
                    return record;
                }
                Ok(Err(LookupError::RateLimited)) => {
                    if attempt + 1 < self.retry.max_attempts {
                        let wait = self.retry.backoff(attempt);
                        tracing::warn!(
                            "Lookup rate limited for {}, waiting {}ms before retry {}/{}",
                            base.code,
                            wait.as_millis(),
                            attempt + 2,
                            self.retry.max_attempts
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
                Ok(Err(LookupError::Timeout)) | Err(_) => {
                    tracing::warn!(
                        "Lookup for {} timed out after {}s",
                        base.code,
                        self.retry.timeout.as_secs()
                    );
                    return fallback(base, "lookup timeout".to_string());
                }
                Ok(Err(e)) => {
                    tracing::warn!("Lookup failed for {}: {}", base.code, e);
                    return fallback(base, format!("lookup error: {}", e));
                }
            }
        }

        fallback(base, "rate limit exceeded, try again later".to_string())
    }

    /// Enrich many identifiers in paced batches. Codes are normalized and
    /// looked up once each; the map is keyed by normalized code.
    pub async fn enrich_batch<S: AsRef<str>>(&self, codes: &[S]) -> HashMap<String, IdentifierRecord> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = codes
            .iter()
            .map(|c| identifier_validator::normalize(c.as_ref()))
            .filter(|c| seen.insert(c.clone()))
            .collect();

        let batch_size = self.batch.batch_size.max(1);
        let batch_count = unique.len().div_ceil(batch_size);
        let mut results = HashMap::with_capacity(unique.len());

        for (i, batch) in unique.chunks(batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.batch.delay_between_batches).await;
            }

            let records = join_all(batch.iter().map(|code| self.enrich(code))).await;
            for (code, record) in batch.iter().zip(records) {
                results.insert(code.clone(), record);
            }

            tracing::info!("Enriched batch {}/{} ({} identifiers)", i + 1, batch_count, batch.len());
        }

        results
    }
}

fn from_lookup(mut record: IdentifierRecord, response: LookupResponse) -> IdentifierRecord {
    record.source = LookupSource::Lookup;

    if let Some(error) = response.error {
        record.is_valid = false;
        record.confidence = FALLBACK_CONFIDENCE;
        record.warning = Some(format!("lookup service error: {}", error));
        return record;
    }

    if !response.found {
        record.is_valid = false;
        record.confidence = FALLBACK_CONFIDENCE;
        record.warning = Some("no data found".to_string());
        return record;
    }

    record.is_valid = true;
    record.confidence = 1.0;
    record.eligibility_flag = eligibility(
        &record.code,
        response.market_sector.as_deref(),
        response.exchange_code.as_deref(),
    )
    .as_flag();
    record.name = response.name;
    record.ticker = response.ticker;
    record.exchange_code = response.exchange_code;
    record.market_sector = response.market_sector;
    record.security_type = response.security_type;
    record.warning = None;
    record
}

fn fallback(mut record: IdentifierRecord, warning: String) -> IdentifierRecord {
    record.is_valid = false;
    record.confidence = FALLBACK_CONFIDENCE;
    record.source = LookupSource::Fallback;
    record.warning = Some(warning);
    record
}
