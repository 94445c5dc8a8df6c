//! Key-server lookups over HKP.

use std::time::Duration;

use async_trait::async_trait;
use depverify_core::KeyId;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use crate::error::KeyServerError;

const HKP_PORT: u16 = 11371;

/// Fetches public key material from a single key server.
///
/// Implementations report a definitive miss as [`KeyServerError::NotFound`]
/// and anything worth retrying as [`KeyServerError::Transport`].
#[async_trait]
pub trait KeyServerClient: Send + Sync {
    async fn fetch(&self, server: &Url, key: &KeyId) -> Result<Vec<u8>, KeyServerError>;
}

/// HKP client for `hkp`, `hkps`, `http` and `https` key servers.
#[derive(Clone, Debug)]
pub struct HkpClient {
    client: Client,
    timeout: Duration,
}

impl HkpClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl KeyServerClient for HkpClient {
    #[instrument(skip_all, fields(server = %server, key = %key))]
    async fn fetch(&self, server: &Url, key: &KeyId) -> Result<Vec<u8>, KeyServerError> {
        let url = lookup_url(server, key)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| KeyServerError::transport(server, err.to_string()))?;

        let status = response.status();
        debug!(%status, "key server responded");
        if status == StatusCode::NOT_FOUND {
            return Err(KeyServerError::not_found(server, key));
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(KeyServerError::transport(server, format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(KeyServerError::not_found(server, key));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| KeyServerError::transport(server, err.to_string()))?;
        if body.is_empty() {
            return Err(KeyServerError::not_found(server, key));
        }
        Ok(body.to_vec())
    }
}

/// The machine-readable HKP `get` URL for `key` on `server`.
pub fn lookup_url(server: &Url, key: &KeyId) -> Result<Url, KeyServerError> {
    let (scheme, default_port) = match server.scheme() {
        "hkp" => ("http", Some(HKP_PORT)),
        "hkps" | "https" => ("https", None),
        "http" => ("http", None),
        _ => return Err(KeyServerError::UnsupportedScheme(server.clone())),
    };
    let host = server
        .host_str()
        .ok_or_else(|| KeyServerError::UnsupportedScheme(server.clone()))?;
    let base = match server.port().or(default_port) {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    };

    let mut url =
        Url::parse(&base).map_err(|_| KeyServerError::UnsupportedScheme(server.clone()))?;
    url.set_path("/pks/lookup");
    url.query_pairs_mut()
        .append_pair("op", "get")
        .append_pair("options", "mr")
        .append_pair("search", &format!("0x{key}"));
    Ok(url)
}
