use std::sync::Arc;

use depverify_core::signature::{
    DetachedSignature, SignerIdentity, primary_fingerprint, verify_detached,
};
use depverify_core::{FailureReason, IgnoredKey, KeyId, SignatureTrust};
use tracing::{debug, instrument};

use crate::resolver::KeyResolver;

/// Checks detached signatures against the keys a component trusts.
///
/// Trust is decided from the signature's issuer before any key is resolved,
/// so an untrusted signer never costs a key-server round trip.
#[derive(Clone)]
pub struct SignatureVerifier {
    resolver: Arc<KeyResolver>,
}

impl SignatureVerifier {
    pub fn new(resolver: Arc<KeyResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<KeyResolver> {
        &self.resolver
    }

    /// Every signature packet in `signature` must be trusted and valid.
    #[instrument(skip_all)]
    pub async fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        trust: &SignatureTrust,
        ignored: &[IgnoredKey],
    ) -> Result<SignerIdentity, FailureReason> {
        let signatures = DetachedSignature::parse_all(signature)?;

        for signature in &signatures {
            let issuer = signature.issuer();
            if let Some(ignored) = ignored
                .iter()
                .find(|ignored| signature.issuers().iter().any(|id| ignored.id.matches(id)))
            {
                return Err(FailureReason::IgnoredKey {
                    key: issuer.clone(),
                    reason: ignored.reason.clone(),
                });
            }
            if !signature.issuers().iter().any(|id| self.is_trusted(id, trust)) {
                debug!(%issuer, "signature issuer is not trusted");
                return Err(FailureReason::UntrustedKey {
                    key: issuer.clone(),
                });
            }
        }

        let mut signer = None;
        for signature in &signatures {
            let record = self.resolver.resolve(signature.issuer()).await?;
            let identity = verify_detached(data, signature, &record)?;
            // A long-id match before resolution is confirmed against full fingerprints.
            if !trust.trusted_keys.iter().any(|key| identity.matches(key)) {
                return Err(FailureReason::UntrustedKey {
                    key: identity.signing_key,
                });
            }
            debug!(signing_key = %identity.signing_key, "signature verified");
            signer.get_or_insert(identity);
        }

        signer.ok_or_else(|| FailureReason::MalformedSignature {
            detail: "no signature packet found".to_string(),
        })
    }

    /// Trusted directly, or a subkey of a cached certificate whose primary is trusted.
    fn is_trusted(&self, issuer: &KeyId, trust: &SignatureTrust) -> bool {
        trust.is_trusted(issuer)
            || self
                .resolver
                .cache()
                .get(issuer)
                .and_then(|record| primary_fingerprint(&record.material))
                .is_some_and(|primary| trust.is_trusted(&primary))
    }
}
