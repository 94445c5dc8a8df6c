use std::collections::HashSet;
use std::sync::Arc;

use depverify_core::policy::{self, Decision};
use depverify_core::{
    ArtifactRef, ChecksumAlgorithm, FailureReason, Outcome, SignatureTrust, SkipReason,
    SignerIdentity, TrustModel, TrustReason, VerificationMethod, VerificationResult, checksum,
};
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::report::SessionReport;
use crate::resolver::KeyResolver;
use crate::signature::SignatureVerifier;

/// A fetched artifact handed over by the resolution pipeline.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub reference: ArtifactRef,
    pub bytes: Arc<[u8]>,
    /// Detached OpenPGP signature, when the repository published one.
    pub signature: Option<Arc<[u8]>>,
}

impl Artifact {
    pub fn new(reference: ArtifactRef, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            reference,
            bytes: bytes.into(),
            signature: None,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<Arc<[u8]>>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

/// Entry point of a verification session.
///
/// Cheap to clone; clones share the trust model and the key cache.
#[derive(Clone)]
pub struct Verifier {
    model: Arc<TrustModel>,
    signatures: SignatureVerifier,
}

impl Verifier {
    pub fn new(model: Arc<TrustModel>, resolver: Arc<KeyResolver>) -> Self {
        Self {
            model,
            signatures: SignatureVerifier::new(resolver),
        }
    }

    pub fn model(&self) -> &TrustModel {
        &self.model
    }

    /// Verify one artifact. Always terminates in exactly one outcome.
    #[instrument(skip_all, fields(artifact = %artifact.reference))]
    pub async fn verify(&self, artifact: &Artifact) -> VerificationResult {
        let reference = &artifact.reference;
        let notices = policy::trust_weakenings(&reference.component, &self.model);
        for notice in &notices {
            warn!(flag = %notice.flag, "component override disables a globally enabled check");
        }

        let outcome = match policy::classify(reference, &self.model) {
            Ok(decision) => self.run(decision, artifact).await,
            Err(undeclared) => {
                debug!(%undeclared, "failing closed");
                Outcome::failed(FailureReason::UndeclaredArtifact)
            }
        };

        if outcome.is_failure() {
            warn!(%outcome, "artifact failed verification");
        } else {
            debug!(%outcome, "artifact accepted");
        }
        VerificationResult::new(reference.clone(), outcome).with_notices(notices)
    }

    async fn run(&self, decision: Decision, artifact: &Artifact) -> Outcome {
        match decision {
            Decision::Exempt(index) => {
                let exemption = &self.model.exemptions[index];
                Outcome::Trusted(TrustReason::ExemptionMatched {
                    rule: exemption.kind.clone(),
                    reason: exemption.reason.clone(),
                })
            }
            Decision::RequireNone => Outcome::Skipped(SkipReason::VerificationDisabled),
            Decision::RequireChecksum => match self.check_checksums(artifact) {
                Ok(algorithms) => Outcome::Verified(VerificationMethod::Checksum { algorithms }),
                Err(reasons) => Outcome::Failed(reasons),
            },
            Decision::RequireSignature => match self.check_signature(artifact).await {
                Ok(identity) => Outcome::Verified(VerificationMethod::Signature {
                    fingerprint: identity.signing_key,
                }),
                Err(reason) => Outcome::failed(reason),
            },
            Decision::RequireBoth => {
                let checksums = self.check_checksums(artifact);
                let signature = self.check_signature(artifact).await;
                match (checksums, signature) {
                    (Ok(algorithms), Ok(identity)) => {
                        Outcome::Verified(VerificationMethod::ChecksumAndSignature {
                            algorithms,
                            fingerprint: identity.signing_key,
                        })
                    }
                    (checksums, signature) => {
                        let mut reasons = checksums.err().unwrap_or_default();
                        reasons.extend(signature.err());
                        Outcome::Failed(reasons)
                    }
                }
            }
        }
    }

    /// Every declared checksum must match.
    fn check_checksums(&self, artifact: &Artifact) -> Result<Vec<ChecksumAlgorithm>, Vec<FailureReason>> {
        let mut algorithms = Vec::new();
        let mut failures = Vec::new();
        for declaration in self.model.checksums_for(&artifact.reference) {
            match checksum::verify(&artifact.bytes, declaration) {
                Ok(matched) => {
                    debug!(algorithm = %declaration.algorithm, ?matched, "checksum matched");
                    algorithms.push(declaration.algorithm);
                }
                Err(reason) => failures.push(reason),
            }
        }

        if failures.is_empty() {
            Ok(algorithms)
        } else {
            Err(failures)
        }
    }

    async fn check_signature(&self, artifact: &Artifact) -> Result<SignerIdentity, FailureReason> {
        let Some(signature) = &artifact.signature else {
            return Err(FailureReason::MissingSignature);
        };
        let trust = SignatureTrust {
            trusted_keys: self.model.trusted_keys_for(&artifact.reference),
        };
        self.signatures
            .verify(&artifact.bytes, signature, &trust, &self.model.ignored_keys)
            .await
    }

    /// Verify a batch concurrently, one task per artifact.
    ///
    /// Repeated references are verified once. Results keep input order.
    pub async fn verify_all(&self, artifacts: Vec<Artifact>) -> SessionReport {
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();
        for (index, artifact) in artifacts.into_iter().enumerate() {
            if !seen.insert(artifact.reference.clone()) {
                debug!(artifact = %artifact.reference, "duplicate artifact skipped");
                continue;
            }
            let verifier = self.clone();
            tasks.spawn(async move { (index, verifier.verify(&artifact).await) });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => warn!(%err, "verification task was cancelled"),
            }
        }
        results.sort_by_key(|(index, _)| *index);

        SessionReport::new(results.into_iter().map(|(_, result)| result).collect())
    }
}
