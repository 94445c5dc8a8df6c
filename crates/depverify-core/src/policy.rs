//! Decides which checks an artifact must pass.

use thiserror::Error;
use tracing::debug;

use crate::model::{ArtifactRef, ComponentId, TrustModel, TrustedArtifactExemption};
use crate::outcome::{TrustWeakening, WeakenedFlag};

/// The checks required for one artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Matched the trusted artifact rule at this index.
    Exempt(usize),
    RequireChecksum,
    RequireSignature,
    RequireBoth,
    RequireNone,
}

/// Verification is on for an artifact the metadata says nothing about.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{artifact} is not declared in the verification metadata")]
pub struct UndeclaredArtifact {
    pub artifact: ArtifactRef,
}

/// Verify flags after applying component overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectiveFlags {
    pub verify_metadata: bool,
    pub verify_signatures: bool,
}

pub fn effective_flags(component: &ComponentId, model: &TrustModel) -> EffectiveFlags {
    let local = model.local_override(component);
    EffectiveFlags {
        verify_metadata: local
            .verify_metadata
            .unwrap_or(model.config.verify_metadata),
        verify_signatures: local
            .verify_signatures
            .unwrap_or(model.config.verify_signatures),
    }
}

/// First trusted artifact rule matching `artifact`, in declaration order.
pub fn matching_exemption<'m>(
    artifact: &ArtifactRef,
    model: &'m TrustModel,
) -> Option<(usize, &'m TrustedArtifactExemption)> {
    model
        .exemptions
        .iter()
        .enumerate()
        .find(|(_, exemption)| exemption.matches(artifact))
}

pub fn classify(artifact: &ArtifactRef, model: &TrustModel) -> Result<Decision, UndeclaredArtifact> {
    // Globally off and not switched back on by the component.
    let local = model.local_override(&artifact.component);
    if !model.config.verify_metadata && local.verify_metadata != Some(true) {
        return Ok(Decision::RequireNone);
    }

    if let Some((index, exemption)) = matching_exemption(artifact, model) {
        debug!(%artifact, rule = %exemption.kind, "trusted artifact rule matched");
        return Ok(Decision::Exempt(index));
    }

    let flags = effective_flags(&artifact.component, model);
    let checksum_required = flags.verify_metadata && !model.checksums_for(artifact).is_empty();
    let signature_required =
        flags.verify_signatures && !model.trusted_keys_for(artifact).is_empty();

    match (checksum_required, signature_required) {
        (true, true) => Ok(Decision::RequireBoth),
        (true, false) => Ok(Decision::RequireChecksum),
        (false, true) => Ok(Decision::RequireSignature),
        // The component opted out of metadata checks and has nothing to sign against.
        (false, false) if !flags.verify_metadata => Ok(Decision::RequireNone),
        (false, false) => Err(UndeclaredArtifact {
            artifact: artifact.clone(),
        }),
    }
}

/// Component overrides that switch off a check enabled globally.
pub fn trust_weakenings(component: &ComponentId, model: &TrustModel) -> Vec<TrustWeakening> {
    let local = model.local_override(component);
    let mut weakenings = Vec::new();
    if model.config.verify_metadata && local.verify_metadata == Some(false) {
        weakenings.push(TrustWeakening {
            flag: WeakenedFlag::VerifyMetadata,
        });
    }
    if model.config.verify_signatures && local.verify_signatures == Some(false) {
        weakenings.push(TrustWeakening {
            flag: WeakenedFlag::VerifySignatures,
        });
    }
    weakenings
}
