use std::io;

use depverify_core::KeyId;
use thiserror::Error;
use url::Url;

/// Failure of a single key-server lookup.
#[derive(Debug, Error)]
pub enum KeyServerError {
    #[error("key {key} is not published on {server}")]
    NotFound { server: Url, key: KeyId },
    #[error("transport failure talking to {server}: {message}")]
    Transport { server: Url, message: String },
    #[error("key server `{0}` uses an unsupported scheme")]
    UnsupportedScheme(Url),
}

impl KeyServerError {
    pub fn not_found(server: &Url, key: &KeyId) -> Self {
        Self::NotFound {
            server: server.clone(),
            key: key.clone(),
        }
    }

    pub fn transport(server: &Url, message: impl Into<String>) -> Self {
        Self::Transport {
            server: server.clone(),
            message: message.into(),
        }
    }

    /// Whether another attempt against the same server may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Errors raised while setting up a verification session.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml_bw::Error),
    #[error("failed to build key server HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Metadata(#[from] depverify_core::MetadataError),
}
