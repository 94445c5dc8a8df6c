use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use depverify_core::TrustModel;
use depverify_core::codec::is_json;
use serde::{Deserialize, Serialize};

use crate::cache::KeyCache;
use crate::error::SettingsError;
use crate::keyserver::HkpClient;
use crate::orchestrator::Verifier;
use crate::resolver::KeyResolver;
use crate::retry::RetryPolicy;

/// Host settings for a verification session.
///
/// Trust decisions come from the metadata document; these only tune how keys
/// are fetched and where they are kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct VerifierSettings {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub request_timeout_ms: u64,
    /// Upper bound on key-server time per key. Unbounded when absent.
    pub key_server_budget_ms: Option<u64>,
    /// Directory of `<KEY ID>.gpg` files used as a persistent key cache.
    pub keyring_dir: Option<PathBuf>,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 200,
            request_timeout_ms: 10_000,
            key_server_budget_ms: None,
            keyring_dir: None,
        }
    }
}

impl VerifierSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn key_server_budget(&self) -> Option<Duration> {
        self.key_server_budget_ms.map(Duration::from_millis)
    }

    /// Key cache backed by `keyring_dir` when set, in memory otherwise.
    pub fn key_cache(&self) -> Result<KeyCache, SettingsError> {
        match &self.keyring_dir {
            Some(dir) => Ok(KeyCache::with_directory(dir)?),
            None => Ok(KeyCache::in_memory()),
        }
    }

    /// A [`Verifier`] talking HKP to the key servers listed in `model`.
    pub fn build_verifier(&self, model: TrustModel) -> Result<Verifier, SettingsError> {
        let client = HkpClient::new(self.request_timeout())?;
        let resolver = KeyResolver::new(&model.config, Arc::new(self.key_cache()?), Arc::new(client))
            .with_retry(self.retry_policy())
            .with_budget(self.key_server_budget());
        Ok(Verifier::new(Arc::new(model), Arc::new(resolver)))
    }
}

/// Load [`VerifierSettings`] from JSON or YAML.
pub fn load_settings(path: &Path) -> Result<VerifierSettings, SettingsError> {
    let content = fs::read_to_string(path)?;
    parse_settings(path, &content)
}

pub fn parse_settings(path: &Path, content: &str) -> Result<VerifierSettings, SettingsError> {
    if is_json(path, content) {
        Ok(serde_json::from_str(content)?)
    } else {
        Ok(serde_yaml_bw::from_str(content)?)
    }
}
