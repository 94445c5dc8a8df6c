use std::io;

use thiserror::Error;

use crate::checksum::ChecksumAlgorithm;
use crate::model::ComponentId;

/// Trust metadata that cannot be turned into a [`TrustModel`](crate::TrustModel).
///
/// Any of these is fatal at load time: a verification session cannot start
/// from malformed metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("I/O error while reading verification metadata")]
    Io(#[from] io::Error),
    #[error("invalid JSON verification metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML verification metadata: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),
    #[error("invalid key id `{0}`: expected a 16, 40 or 64 digit hex identifier")]
    InvalidKeyId(String),
    #[error("unknown checksum algorithm `{0}`")]
    UnknownAlgorithm(String),
    #[error("{algorithm} checksum for `{artifact}` in {component} is empty")]
    EmptyChecksum {
        component: ComponentId,
        artifact: String,
        algorithm: ChecksumAlgorithm,
    },
    #[error(
        "{algorithm} checksum `{value}` for `{artifact}` in {component} is not {expected_len} hex digits"
    )]
    InvalidChecksum {
        component: ComponentId,
        artifact: String,
        algorithm: ChecksumAlgorithm,
        value: String,
        expected_len: usize,
    },
    #[error("invalid trusted artifact regex `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("trust rule must declare exactly one of `file` or `regex`")]
    AmbiguousExemption,
    #[error("component {0} is declared more than once")]
    DuplicateComponent(ComponentId),
    #[error("component entry has an empty {0}")]
    EmptyCoordinate(&'static str),
    #[error("invalid key server uri `{uri}`: {source}")]
    InvalidKeyServer {
        uri: String,
        #[source]
        source: url::ParseError,
    },
}

impl MetadataError {
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    pub fn invalid_key_server(uri: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidKeyServer {
            uri: uri.into(),
            source,
        }
    }
}
