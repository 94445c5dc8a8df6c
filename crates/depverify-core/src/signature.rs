//! OpenPGP detached signature parsing and cryptographic checks.
//!
//! Trust decisions and key lookup happen in the caller; this module only
//! answers "who claims to have signed this" and "does the key agree".

use anyhow::Context;
use sequoia_openpgp as openpgp;

use openpgp::cert::prelude::*;
use openpgp::packet::Signature;
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::types::RevocationStatus;
use openpgp::{Cert, Packet, PacketPile};

use tracing::debug;

use crate::keys::{KeyId, KeyRecord};
use crate::outcome::FailureReason;

/// One signature packet from a detached signature file.
#[derive(Clone, Debug)]
pub struct DetachedSignature {
    packet: Signature,
    issuers: Vec<KeyId>,
}

impl DetachedSignature {
    /// Parse every signature packet in a binary or armored signature file.
    pub fn parse_all(bytes: &[u8]) -> Result<Vec<Self>, FailureReason> {
        let pile = PacketPile::from_bytes(bytes).map_err(|err| malformed(err.to_string()))?;
        let signatures = pile
            .into_children()
            .filter_map(|packet| match packet {
                Packet::Signature(signature) => Some(signature),
                _ => None,
            })
            .map(Self::from_packet)
            .collect::<Result<Vec<_>, _>>()?;

        if signatures.is_empty() {
            return Err(malformed("no signature packet found"));
        }
        Ok(signatures)
    }

    fn from_packet(packet: Signature) -> Result<Self, FailureReason> {
        let mut issuers: Vec<KeyId> = Vec::new();
        let candidates = packet
            .issuer_fingerprints()
            .map(|fingerprint| fingerprint.to_hex())
            .chain(packet.issuers().map(|key_id| key_id.to_hex()));
        for hex in candidates {
            let id = KeyId::parse(&hex).map_err(|err| malformed(err.to_string()))?;
            if !issuers.iter().any(|known| known.matches(&id)) {
                issuers.push(id);
            }
        }

        if issuers.is_empty() {
            return Err(malformed("signature does not name its issuer"));
        }
        // Full fingerprints sort ahead of long ids.
        issuers.sort_by_key(KeyId::is_long_id);
        Ok(Self { packet, issuers })
    }

    /// The most specific identifier of the signing key.
    pub fn issuer(&self) -> &KeyId {
        &self.issuers[0]
    }

    pub fn issuers(&self) -> &[KeyId] {
        &self.issuers
    }
}

/// Keys that produced a valid signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerIdentity {
    /// The (sub)key that made the signature.
    pub signing_key: KeyId,
    /// Primary key of the certificate holding the signing key.
    pub primary_key: KeyId,
}

impl SignerIdentity {
    pub fn matches(&self, id: &KeyId) -> bool {
        self.signing_key.matches(id) || self.primary_key.matches(id)
    }
}

/// Check `signature` over `data` with the certificate in `record`.
///
/// Revocation and expiry are checked before the signature math, so a
/// mathematically valid signature from a dead key still fails.
pub fn verify_detached(
    data: &[u8],
    signature: &DetachedSignature,
    record: &KeyRecord,
) -> Result<SignerIdentity, FailureReason> {
    let issuer = signature.issuer().clone();
    let not_found = || FailureReason::KeyNotFound {
        key: issuer.clone(),
    };

    let cert = load_certificate(&record.material).map_err(|err| {
        debug!(key = %issuer, "{err:#}");
        not_found()
    })?;
    let primary_key = fingerprint_of(&cert.fingerprint().to_hex()).ok_or_else(not_found)?;

    let key = cert
        .keys()
        .find(|key| {
            fingerprint_of(&key.fingerprint().to_hex())
                .is_some_and(|fingerprint| signature.issuers().iter().any(|id| id.matches(&fingerprint)))
        })
        .ok_or_else(not_found)?;
    let signing_key = fingerprint_of(&key.fingerprint().to_hex()).ok_or_else(not_found)?;

    let policy = StandardPolicy::new();
    let valid_key = key
        .with_policy(&policy, None)
        .map_err(|err| FailureReason::SignatureInvalid {
            key: signing_key.clone(),
            detail: format!("key is not usable under the standard policy: {err}"),
        })?;

    let revoked = matches!(valid_key.revocation_status(), RevocationStatus::Revoked(_))
        || matches!(
            valid_key.cert().revocation_status(),
            RevocationStatus::Revoked(_)
        );
    if revoked {
        return Err(FailureReason::KeyRevoked { key: signing_key });
    }
    if valid_key.alive().is_err() || valid_key.cert().alive().is_err() {
        return Err(FailureReason::KeyExpired { key: signing_key });
    }

    let mut packet = signature.packet.clone();
    packet
        .verify_message(valid_key.key(), data)
        .map_err(|err| FailureReason::SignatureInvalid {
            key: signing_key.clone(),
            detail: err.to_string(),
        })?;

    Ok(SignerIdentity {
        signing_key,
        primary_key,
    })
}

/// Whether `material` is a certificate containing a key that matches `id`.
pub fn certificate_contains(material: &[u8], id: &KeyId) -> bool {
    load_certificate(material).is_ok_and(|cert| {
        cert.keys().any(|key| {
            fingerprint_of(&key.fingerprint().to_hex()).is_some_and(|fingerprint| fingerprint.matches(id))
        })
    })
}

/// Fingerprints of every key in the certificate in `material`, primary first.
///
/// Empty when `material` is not a certificate.
pub fn certificate_keys(material: &[u8]) -> Vec<KeyId> {
    load_certificate(material)
        .map(|cert| {
            cert.keys()
                .filter_map(|key| fingerprint_of(&key.fingerprint().to_hex()))
                .collect()
        })
        .unwrap_or_default()
}

/// Primary key fingerprint of the certificate in `material`.
pub fn primary_fingerprint(material: &[u8]) -> Option<KeyId> {
    let cert = load_certificate(material).ok()?;
    fingerprint_of(&cert.fingerprint().to_hex())
}

fn load_certificate(material: &[u8]) -> anyhow::Result<Cert> {
    Cert::from_bytes(material).context("key material is not an OpenPGP certificate")
}

fn fingerprint_of(hex: &str) -> Option<KeyId> {
    KeyId::parse(hex).ok()
}

fn malformed(detail: impl Into<String>) -> FailureReason {
    FailureReason::MalformedSignature {
        detail: detail.into(),
    }
}
