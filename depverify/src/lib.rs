//! Async verification of resolved dependency artifacts.
//!
//! Builds on the trust model in `depverify-core`: resolves OpenPGP keys from a
//! shared cache and HKP key servers, and verifies batches of artifacts
//! concurrently.

pub mod cache;
pub mod config;
pub mod error;
pub mod keyserver;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod signature;

pub use cache::KeyCache;
pub use config::{VerifierSettings, load_settings, parse_settings};
pub use error::{KeyServerError, SettingsError};
pub use keyserver::{HkpClient, KeyServerClient};
pub use orchestrator::{Artifact, Verifier};
pub use report::{OutcomeCounts, SessionReport};
pub use resolver::KeyResolver;
pub use retry::RetryPolicy;
pub use signature::SignatureVerifier;

use std::path::Path;

/// Load metadata from `metadata` and verify `artifacts` with default settings.
pub async fn verify_artifacts(
    metadata: &Path,
    artifacts: Vec<Artifact>,
) -> Result<SessionReport, SettingsError> {
    let model = depverify_core::load_trust_model(metadata)?;
    let verifier = VerifierSettings::default().build_verifier(model)?;
    Ok(verifier.verify_all(artifacts).await)
}
