use std::sync::Arc;
use std::time::Duration;

use depverify_core::signature::certificate_contains;
use depverify_core::{FailureReason, KeyId, KeyRecord, KeySource, VerificationConfig};
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::cache::KeyCache;
use crate::error::KeyServerError;
use crate::keyserver::KeyServerClient;
use crate::retry::{self, RetryPolicy};

/// Resolves key ids to certificates: cache first, then key servers in order.
#[derive(Clone)]
pub struct KeyResolver {
    cache: Arc<KeyCache>,
    client: Arc<dyn KeyServerClient>,
    servers: Vec<Url>,
    servers_enabled: bool,
    retry: RetryPolicy,
    budget: Option<Duration>,
}

impl KeyResolver {
    pub fn new(
        config: &VerificationConfig,
        cache: Arc<KeyCache>,
        client: Arc<dyn KeyServerClient>,
    ) -> Self {
        Self {
            cache,
            client,
            servers: config.key_servers.clone(),
            servers_enabled: config.key_servers_enabled,
            retry: RetryPolicy::default(),
            budget: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound the total time spent querying key servers for one key.
    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn resolve(&self, key: &KeyId) -> Result<KeyRecord, FailureReason> {
        if let Some(record) = self.cache.get(key) {
            debug!("key cache hit");
            return Ok(record);
        }
        if !self.servers_enabled || self.servers.is_empty() {
            debug!("key not cached and key servers are disabled");
            return Err(FailureReason::KeyNotFound { key: key.clone() });
        }

        let lookup = self.query_servers(key);
        let found = match self.budget {
            Some(budget) => timeout(budget, lookup).await.unwrap_or_else(|_| {
                warn!(?budget, "key server budget exhausted");
                None
            }),
            None => lookup.await,
        };

        found.ok_or_else(|| FailureReason::KeyNotFound { key: key.clone() })
    }

    async fn query_servers(&self, key: &KeyId) -> Option<KeyRecord> {
        for server in &self.servers {
            match self.query_with_retry(server, key).await {
                Ok(material) if certificate_contains(&material, key) => {
                    let record =
                        KeyRecord::new(key.clone(), material, KeySource::KeyServer(server.clone()));
                    self.cache.insert(record.clone());
                    debug!(%server, "key fetched");
                    return Some(record);
                }
                Ok(_) => {
                    warn!(%server, "key server returned a certificate without the requested key");
                }
                Err(err) => {
                    debug!(%server, %err, "key server lookup failed");
                }
            }
        }
        None
    }

    async fn query_with_retry(&self, server: &Url, key: &KeyId) -> Result<Vec<u8>, KeyServerError> {
        let attempts = self.retry.attempts();
        let mut attempt = 0;
        loop {
            match self.client.fetch(server, key).await {
                Ok(material) => return Ok(material),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let backoff = retry::backoff(self.retry.base_backoff, attempt);
                    debug!(attempt, ?backoff, %err, "transient key server failure, retrying");
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
