//! Trust model and verification primitives for resolved dependency artifacts.
//!
//! The crate is synchronous and free of I/O beyond loading metadata; key
//! resolution and orchestration live in the `depverify` crate.

pub mod checksum;
pub mod codec;
mod error;
pub mod keys;
pub mod model;
pub mod outcome;
pub mod policy;
pub mod schema;
pub mod signature;

pub use checksum::{ChecksumAlgorithm, ChecksumMatch};
pub use codec::{Format, load_trust_model, parse_trust_model, save_trust_model};
pub use error::MetadataError;
pub use keys::{KeyId, KeyRecord, KeySource};
pub use model::{
    ArtifactPattern, ArtifactRef, ChecksumDeclaration, ComponentEntry, ComponentId, FileMatcher,
    IgnoredKey, LocalOverride, Scope, SignatureTrust, TrustModel, TrustedArtifactExemption,
    TrustedKey, VerificationConfig,
};
pub use outcome::{
    FailureReason, Outcome, SkipReason, TrustReason, TrustWeakening, VerificationMethod,
    VerificationResult, WeakenedFlag,
};
pub use policy::{Decision, UndeclaredArtifact, classify};
pub use signature::{DetachedSignature, SignerIdentity};
