use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::MetadataError;

const LONG_ID_LEN: usize = 16;
const V4_FINGERPRINT_LEN: usize = 40;
const V6_FINGERPRINT_LEN: usize = 64;

/// OpenPGP key identifier: a full fingerprint or a 64-bit long key id.
///
/// Stored as uppercase hex without separators. A long id matches any
/// fingerprint it is the suffix of.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyId(String);

impl KeyId {
    pub fn parse(raw: &str) -> Result<Self, MetadataError> {
        let trimmed = raw.trim();
        let trimmed = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let normalized: String = trimmed
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let valid_len = matches!(
            normalized.len(),
            LONG_ID_LEN | V4_FINGERPRINT_LEN | V6_FINGERPRINT_LEN
        );
        if !valid_len || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MetadataError::InvalidKeyId(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when this is a 64-bit long id rather than a full fingerprint.
    pub fn is_long_id(&self) -> bool {
        self.0.len() == LONG_ID_LEN
    }

    /// The 64-bit long id of this key.
    pub fn long_id(&self) -> &str {
        &self.0[self.0.len() - LONG_ID_LEN..]
    }

    /// Whether both identifiers can name the same key.
    pub fn matches(&self, other: &KeyId) -> bool {
        if self.is_long_id() || other.is_long_id() {
            self.long_id() == other.long_id()
        } else {
            self.0 == other.0
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for KeyId {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for KeyId {
    type Error = MetadataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<KeyId> for String {
    fn from(value: KeyId) -> Self {
        value.0
    }
}

/// Where a [`KeyRecord`] was obtained from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySource {
    /// Loaded from the persistent local keyring.
    Cache,
    KeyServer(Url),
}

/// Public key material resolved for a key id.
#[derive(Clone, Debug)]
pub struct KeyRecord {
    pub fingerprint: KeyId,
    /// Serialized OpenPGP certificate, binary or armored.
    pub material: Arc<[u8]>,
    pub source: KeySource,
    pub fetched_at: SystemTime,
}

impl KeyRecord {
    pub fn new(fingerprint: KeyId, material: impl Into<Arc<[u8]>>, source: KeySource) -> Self {
        Self {
            fingerprint,
            material: material.into(),
            source,
            fetched_at: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_prefix_and_spaces() {
        let id = KeyId::parse("0xabcd 1234 ABCD 1234").expect("long id");
        assert_eq!(id.as_str(), "ABCD1234ABCD1234");
        assert!(id.is_long_id());
    }

    #[test]
    fn rejects_bad_lengths_and_non_hex() {
        assert!(KeyId::parse("ABCD").is_err());
        assert!(KeyId::parse("ZZZZ1234ABCD1234").is_err());
        assert!(KeyId::parse("").is_err());
    }

    #[test]
    fn long_id_matches_fingerprint_suffix() {
        let fpr = KeyId::parse("0123456789ABCDEF0123456789ABCDEF01234567").unwrap();
        let long = KeyId::parse("89ABCDEF01234567").unwrap();
        let other = KeyId::parse("1111111111111111").unwrap();
        assert!(fpr.matches(&long));
        assert!(long.matches(&fpr));
        assert!(!fpr.matches(&other));
    }

    #[test]
    fn full_fingerprints_compare_exactly() {
        let a = KeyId::parse("0123456789ABCDEF0123456789ABCDEF01234567").unwrap();
        let b = KeyId::parse("F123456789ABCDEF0123456789ABCDEF01234567").unwrap();
        assert!(!a.matches(&b));
        assert!(a.matches(&a.clone()));
    }
}
