use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::error::MetadataError;
use crate::model::ChecksumDeclaration;
use crate::outcome::FailureReason;

/// Digest algorithms a checksum declaration may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    /// All algorithms, weakest first.
    pub const ALL: [ChecksumAlgorithm; 4] = [Self::Md5, Self::Sha1, Self::Sha256, Self::Sha512];

    /// Length of a hex encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Lowercase hex digest of `bytes`.
    pub fn digest(self, bytes: &[u8]) -> String {
        match self {
            Self::Md5 => hex_digest::<Md5>(bytes),
            Self::Sha1 => hex_digest::<Sha1>(bytes),
            Self::Sha256 => hex_digest::<Sha256>(bytes),
            Self::Sha512 => hex_digest::<Sha512>(bytes),
        }
    }

    /// Whether `value` is syntactically a digest of this algorithm.
    pub fn is_valid_digest(self, value: &str) -> bool {
        value.len() == self.hex_len() && value.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(MetadataError::UnknownAlgorithm(s.to_string())),
        }
    }
}

fn hex_digest<D: Digest>(bytes: &[u8]) -> String {
    hex::encode(D::digest(bytes))
}

/// Which declared value an artifact matched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChecksumMatch {
    Primary,
    AlsoTrusted(String),
}

/// Check `bytes` against a single declaration.
///
/// The primary value is tried first, then each `also-trust` value in order.
pub fn verify(bytes: &[u8], declaration: &ChecksumDeclaration) -> Result<ChecksumMatch, FailureReason> {
    let actual = declaration.algorithm.digest(bytes);

    if actual.eq_ignore_ascii_case(&declaration.value) {
        return Ok(ChecksumMatch::Primary);
    }
    if let Some(alternate) = declaration
        .also_trust
        .iter()
        .find(|candidate| actual.eq_ignore_ascii_case(candidate))
    {
        return Ok(ChecksumMatch::AlsoTrusted(alternate.clone()));
    }

    Err(FailureReason::ChecksumMismatch {
        algorithm: declaration.algorithm,
        expected: declaration.accepted_values().map(str::to_string).collect(),
        actual,
    })
}
