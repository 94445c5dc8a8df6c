use std::fmt;

use thiserror::Error;

use crate::checksum::ChecksumAlgorithm;
use crate::keys::KeyId;
use crate::model::{ArtifactRef, FileMatcher};

/// Why a single artifact was rejected.
///
/// Every variant carries enough detail to update the trust metadata.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("artifact is not declared in the verification metadata")]
    UndeclaredArtifact,
    #[error("{algorithm} checksum mismatch: expected one of [{}], got {actual}", expected.join(", "))]
    ChecksumMismatch {
        algorithm: ChecksumAlgorithm,
        expected: Vec<String>,
        actual: String,
    },
    #[error("a signature is required but none was supplied")]
    MissingSignature,
    #[error("signature could not be parsed: {detail}")]
    MalformedSignature { detail: String },
    #[error("signed by untrusted key {key}")]
    UntrustedKey { key: KeyId },
    #[error("signed by ignored key {key}{}", reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    IgnoredKey { key: KeyId, reason: Option<String> },
    #[error("public key {key} could not be found in the cache or on any key server")]
    KeyNotFound { key: KeyId },
    #[error("key {key} has been revoked")]
    KeyRevoked { key: KeyId },
    #[error("key {key} has expired")]
    KeyExpired { key: KeyId },
    #[error("signature by {key} is invalid: {detail}")]
    SignatureInvalid { key: KeyId, detail: String },
}

/// Why an artifact was accepted without verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrustReason {
    ExemptionMatched {
        rule: FileMatcher,
        reason: Option<String>,
    },
}

/// How an artifact was verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationMethod {
    Checksum {
        algorithms: Vec<ChecksumAlgorithm>,
    },
    Signature {
        fingerprint: KeyId,
    },
    ChecksumAndSignature {
        algorithms: Vec<ChecksumAlgorithm>,
        fingerprint: KeyId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    VerificationDisabled,
}

/// Terminal state of one artifact verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Trusted(TrustReason),
    Verified(VerificationMethod),
    /// Never empty.
    Failed(Vec<FailureReason>),
    Skipped(SkipReason),
}

impl Outcome {
    pub fn failed(reason: FailureReason) -> Self {
        Self::Failed(vec![reason])
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn failures(&self) -> &[FailureReason] {
        match self {
            Self::Failed(reasons) => reasons,
            _ => &[],
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trusted(TrustReason::ExemptionMatched { rule, .. }) => {
                write!(f, "trusted by {rule}")
            }
            Self::Verified(VerificationMethod::Checksum { algorithms }) => {
                write!(f, "verified by checksum ({})", join(algorithms))
            }
            Self::Verified(VerificationMethod::Signature { fingerprint }) => {
                write!(f, "verified by signature ({fingerprint})")
            }
            Self::Verified(VerificationMethod::ChecksumAndSignature {
                algorithms,
                fingerprint,
            }) => write!(
                f,
                "verified by checksum ({}) and signature ({fingerprint})",
                join(algorithms)
            ),
            Self::Failed(reasons) => {
                f.write_str("failed: ")?;
                for (idx, reason) in reasons.iter().enumerate() {
                    if idx > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{reason}")?;
                }
                Ok(())
            }
            Self::Skipped(SkipReason::VerificationDisabled) => {
                f.write_str("skipped: verification disabled")
            }
        }
    }
}

fn join(algorithms: &[ChecksumAlgorithm]) -> String {
    algorithms
        .iter()
        .map(|algorithm| algorithm.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Verify flag that a component override switched off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeakenedFlag {
    VerifyMetadata,
    VerifySignatures,
}

impl fmt::Display for WeakenedFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VerifyMetadata => f.write_str("verify-metadata"),
            Self::VerifySignatures => f.write_str("verify-signatures"),
        }
    }
}

/// A component override that disabled a globally enabled check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustWeakening {
    pub flag: WeakenedFlag,
}

impl fmt::Display for TrustWeakening {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is disabled by a component override", self.flag)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub artifact: ArtifactRef,
    pub outcome: Outcome,
    pub notices: Vec<TrustWeakening>,
}

impl VerificationResult {
    pub fn new(artifact: ArtifactRef, outcome: Outcome) -> Self {
        Self {
            artifact,
            outcome,
            notices: Vec::new(),
        }
    }

    pub fn with_notices(mut self, notices: Vec<TrustWeakening>) -> Self {
        self.notices = notices;
        self
    }
}
