use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use depverify::{
    Artifact, KeyCache, KeyResolver, KeyServerClient, KeyServerError, RetryPolicy, Verifier,
};
use depverify_core::{
    ArtifactRef, ChecksumAlgorithm, ComponentId, FailureReason, KeyId, KeyRecord, KeySource,
    Outcome, SkipReason, TrustModel, TrustReason, VerificationMethod, WeakenedFlag,
    parse_trust_model,
};
use sequoia_openpgp as openpgp;
use openpgp::Packet;
use openpgp::cert::prelude::*;
use openpgp::packet::signature::SignatureBuilder;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::SerializeInto;
use openpgp::types::SignatureType;
use url::Url;

const PRIMARY_SERVER: &str = "hkps://primary.example.org";
const BACKUP_SERVER: &str = "hkps://backup.example.org";

/// How a fake key server answers.
#[derive(Clone)]
enum Behavior {
    Serve(Vec<u8>),
    Missing,
    Down,
    /// Transport failures for the first `failures` calls, then serves.
    Flaky { failures: usize, material: Vec<u8> },
    Hang,
}

#[derive(Default)]
struct FakeKeyServers {
    behavior: HashMap<Url, Behavior>,
    calls: Mutex<Vec<Url>>,
}

impl FakeKeyServers {
    fn with(mut self, server: &str, behavior: Behavior) -> Self {
        self.behavior.insert(url(server), behavior);
        self
    }

    fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_to(&self, server: &str) -> usize {
        let server = url(server);
        self.calls().iter().filter(|called| **called == server).count()
    }
}

#[async_trait]
impl KeyServerClient for FakeKeyServers {
    async fn fetch(&self, server: &Url, key: &KeyId) -> Result<Vec<u8>, KeyServerError> {
        let previous = {
            let mut calls = self.calls.lock().unwrap();
            let previous = calls.iter().filter(|called| *called == server).count();
            calls.push(server.clone());
            previous
        };
        match self.behavior.get(server) {
            Some(Behavior::Serve(material)) => Ok(material.clone()),
            Some(Behavior::Flaky { failures, material }) if previous >= *failures => {
                Ok(material.clone())
            }
            Some(Behavior::Flaky { .. }) | Some(Behavior::Down) => {
                Err(KeyServerError::transport(server, "connection reset"))
            }
            Some(Behavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(KeyServerError::transport(server, "timed out"))
            }
            Some(Behavior::Missing) | None => Err(KeyServerError::not_found(server, key)),
        }
    }
}

struct Signer {
    cert: Cert,
}

impl Signer {
    fn generate(email: &str) -> anyhow::Result<Self> {
        let (cert, _) = CertBuilder::new()
            .add_userid(email)
            .add_signing_subkey()
            .generate()?;
        Ok(Self { cert })
    }

    /// Fingerprint of the subkey that signs, as it appears in signatures.
    fn signing_fingerprint(&self) -> String {
        let policy = StandardPolicy::new();
        self.cert
            .keys()
            .with_policy(&policy, None)
            .for_signing()
            .next()
            .expect("signing key")
            .key()
            .fingerprint()
            .to_hex()
    }

    fn primary_fingerprint(&self) -> String {
        self.cert.fingerprint().to_hex()
    }

    fn public(&self) -> anyhow::Result<Vec<u8>> {
        self.cert.to_vec()
    }

    fn sign(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let policy = StandardPolicy::new();
        let mut keypair = self
            .cert
            .keys()
            .with_policy(&policy, None)
            .secret()
            .for_signing()
            .next()
            .context("certificate has no signing key")?
            .key()
            .clone()
            .into_keypair()?;
        let signature = SignatureBuilder::new(SignatureType::Binary).sign_message(&mut keypair, data)?;
        Ok(Packet::from(signature).to_vec()?)
    }
}

fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

fn model(yaml: &str) -> TrustModel {
    parse_trust_model(Path::new("verification-metadata.yaml"), yaml).expect("metadata")
}

fn artifact(group: &str, name: &str, version: &str, file: &str, bytes: &[u8]) -> Artifact {
    Artifact::new(
        ArtifactRef::new(ComponentId::new(group, name, version), file),
        bytes.to_vec(),
    )
}

fn verifier(model: TrustModel, servers: Arc<FakeKeyServers>) -> (Verifier, Arc<KeyCache>) {
    let cache = Arc::new(KeyCache::in_memory());
    let resolver = KeyResolver::new(&model.config, Arc::clone(&cache), servers).with_retry(
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
        },
    );
    (
        Verifier::new(Arc::new(model), Arc::new(resolver)),
        cache,
    )
}

fn signed_component_yaml(fingerprint: &str, servers: &[&str]) -> String {
    let uris = servers
        .iter()
        .map(|server| format!("\"{server}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"
configuration:
  verify-metadata: true
  verify-signatures: true
  key-servers:
    uris: [{uris}]
components:
  - group: org.example
    name: lib
    version: "1.0"
    pgp: ["{fingerprint}"]
"#
    )
}

fn sha256(bytes: &[u8]) -> String {
    ChecksumAlgorithm::Sha256.digest(bytes)
}

#[tokio::test]
async fn exempt_file_is_trusted_without_checks() {
    let model = model(
        r#"
configuration:
  trusted-artifacts:
    - file: foo-1.0.jar
      reason: vendored
"#,
    );
    let servers = Arc::new(FakeKeyServers::default());
    let (verifier, _) = verifier(model, Arc::clone(&servers));

    let result = verifier
        .verify(&artifact("org.foo", "foo", "1.0", "foo-1.0.jar", b"anything"))
        .await;
    match result.outcome {
        Outcome::Trusted(TrustReason::ExemptionMatched { reason, .. }) => {
            assert_eq!(reason.as_deref(), Some("vendored"));
        }
        other => panic!("expected trusted, got {other:?}"),
    }

    // The exact file rule does not cover other files.
    let other = verifier
        .verify(&artifact("org.foo", "foo", "1.0", "foo-1.0-sources.jar", b"anything"))
        .await;
    assert_eq!(other.outcome, Outcome::failed(FailureReason::UndeclaredArtifact));
    assert!(servers.calls().is_empty());
}

#[tokio::test]
async fn also_trusted_checksum_is_accepted() {
    let yaml = format!(
        r#"
components:
  - group: org.example
    name: lib
    version: "1.0"
    artifacts:
      - name: lib-1.0.jar
        sha256:
          value: "{primary}"
          also-trust: ["{rebuilt}"]
"#,
        primary = sha256(b"original"),
        rebuilt = sha256(b"rebuilt"),
    );
    let (verifier, _) = verifier(model(&yaml), Arc::new(FakeKeyServers::default()));

    let rebuilt = verifier
        .verify(&artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"rebuilt"))
        .await;
    assert_eq!(
        rebuilt.outcome,
        Outcome::Verified(VerificationMethod::Checksum {
            algorithms: vec![ChecksumAlgorithm::Sha256],
        })
    );

    let tampered = verifier
        .verify(&artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"tampered"))
        .await;
    match tampered.outcome.failures() {
        [FailureReason::ChecksumMismatch { expected, actual, .. }] => {
            assert_eq!(expected.len(), 2);
            assert_eq!(actual, &sha256(b"tampered"));
        }
        other => panic!("expected one mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn every_declared_checksum_must_match() {
    let yaml = format!(
        r#"
components:
  - group: org.example
    name: lib
    version: "1.0"
    artifacts:
      - name: lib-1.0.jar
        sha256:
          value: "{good}"
        md5:
          value: "{bad}"
"#,
        good = sha256(b"payload"),
        bad = ChecksumAlgorithm::Md5.digest(b"something else"),
    );
    let (verifier, _) = verifier(model(&yaml), Arc::new(FakeKeyServers::default()));

    let result = verifier
        .verify(&artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload"))
        .await;
    match result.outcome.failures() {
        [FailureReason::ChecksumMismatch { algorithm, .. }] => {
            assert_eq!(*algorithm, ChecksumAlgorithm::Md5);
        }
        other => panic!("expected md5 mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn untrusted_signer_never_reaches_a_key_server() -> anyhow::Result<()> {
    let trusted = Signer::generate("trusted@example.org")?;
    let stranger = Signer::generate("stranger@example.org")?;
    let servers = Arc::new(
        FakeKeyServers::default().with(PRIMARY_SERVER, Behavior::Serve(stranger.public()?)),
    );
    let yaml = signed_component_yaml(&trusted.signing_fingerprint(), &[PRIMARY_SERVER]);
    let (verifier, cache) = verifier(model(&yaml), Arc::clone(&servers));

    let result = verifier
        .verify(
            &artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload")
                .with_signature(stranger.sign(b"payload")?),
        )
        .await;

    match result.outcome.failures() {
        [FailureReason::UntrustedKey { key }] => {
            assert_eq!(key.as_str(), stranger.signing_fingerprint());
        }
        other => panic!("expected untrusted key, got {other:?}"),
    }
    assert!(servers.calls().is_empty());
    assert!(cache.is_empty());
    Ok(())
}

#[tokio::test]
async fn trusted_signature_is_verified_and_cached() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let servers = Arc::new(
        FakeKeyServers::default().with(PRIMARY_SERVER, Behavior::Serve(signer.public()?)),
    );
    let yaml = signed_component_yaml(&signer.signing_fingerprint(), &[PRIMARY_SERVER]);
    let (verifier, cache) = verifier(model(&yaml), Arc::clone(&servers));

    let signed = artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload")
        .with_signature(signer.sign(b"payload")?);
    let first = verifier.verify(&signed).await;
    let second = verifier.verify(&signed).await;

    let expected = Outcome::Verified(VerificationMethod::Signature {
        fingerprint: KeyId::parse(&signer.signing_fingerprint()).unwrap(),
    });
    assert_eq!(first.outcome, expected);
    assert_eq!(second, first);
    assert_eq!(servers.calls().len(), 1, "second run must hit the cache");
    assert_eq!(cache.len(), 1);
    Ok(())
}

#[tokio::test]
async fn cached_key_needs_no_server() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let servers = Arc::new(FakeKeyServers::default());
    let yaml = signed_component_yaml(&signer.signing_fingerprint(), &[PRIMARY_SERVER]);
    let (verifier, cache) = verifier(model(&yaml), Arc::clone(&servers));
    cache.insert(KeyRecord::new(
        KeyId::parse(&signer.signing_fingerprint()).unwrap(),
        signer.public()?,
        KeySource::Cache,
    ));

    let result = verifier
        .verify(
            &artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload")
                .with_signature(signer.sign(b"payload")?),
        )
        .await;
    assert!(matches!(result.outcome, Outcome::Verified(_)), "{result:?}");
    assert!(servers.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn trusted_primary_key_is_recognised_from_the_cache() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let yaml = signed_component_yaml(&signer.primary_fingerprint(), &[]);
    let (verifier, cache) = verifier(model(&yaml), Arc::new(FakeKeyServers::default()));
    cache.insert(KeyRecord::new(
        KeyId::parse(&signer.primary_fingerprint()).unwrap(),
        signer.public()?,
        KeySource::Cache,
    ));

    let result = verifier
        .verify(
            &artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload")
                .with_signature(signer.sign(b"payload")?),
        )
        .await;
    assert!(matches!(result.outcome, Outcome::Verified(_)), "{result:?}");
    Ok(())
}

#[tokio::test]
async fn servers_are_tried_in_order_until_one_has_the_key() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let servers = Arc::new(
        FakeKeyServers::default()
            .with(PRIMARY_SERVER, Behavior::Missing)
            .with(BACKUP_SERVER, Behavior::Serve(signer.public()?))
            .with("hkps://never.example.org", Behavior::Serve(signer.public()?)),
    );
    let yaml = signed_component_yaml(
        &signer.signing_fingerprint(),
        &[PRIMARY_SERVER, BACKUP_SERVER, "hkps://never.example.org"],
    );
    let (verifier, cache) = verifier(model(&yaml), Arc::clone(&servers));

    let result = verifier
        .verify(
            &artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload")
                .with_signature(signer.sign(b"payload")?),
        )
        .await;

    assert!(matches!(result.outcome, Outcome::Verified(_)), "{result:?}");
    assert_eq!(servers.calls(), vec![url(PRIMARY_SERVER), url(BACKUP_SERVER)]);
    let cached = cache
        .get(&KeyId::parse(&signer.signing_fingerprint()).unwrap())
        .expect("cached key");
    assert_eq!(cached.source, KeySource::KeyServer(url(BACKUP_SERVER)));
    Ok(())
}

#[tokio::test]
async fn transport_failures_are_retried_but_misses_are_not() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let servers = Arc::new(
        FakeKeyServers::default()
            .with(PRIMARY_SERVER, Behavior::Missing)
            .with(
                BACKUP_SERVER,
                Behavior::Flaky {
                    failures: 2,
                    material: signer.public()?,
                },
            ),
    );
    let yaml = signed_component_yaml(&signer.signing_fingerprint(), &[PRIMARY_SERVER, BACKUP_SERVER]);
    let (verifier, _) = verifier(model(&yaml), Arc::clone(&servers));

    let result = verifier
        .verify(
            &artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload")
                .with_signature(signer.sign(b"payload")?),
        )
        .await;

    assert!(matches!(result.outcome, Outcome::Verified(_)), "{result:?}");
    assert_eq!(servers.calls_to(PRIMARY_SERVER), 1);
    assert_eq!(servers.calls_to(BACKUP_SERVER), 3);
    Ok(())
}

#[tokio::test]
async fn unreachable_servers_yield_key_not_found() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let servers = Arc::new(FakeKeyServers::default().with(PRIMARY_SERVER, Behavior::Down));
    let yaml = signed_component_yaml(&signer.signing_fingerprint(), &[PRIMARY_SERVER]);
    let (verifier, _) = verifier(model(&yaml), Arc::clone(&servers));

    let result = verifier
        .verify(
            &artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload")
                .with_signature(signer.sign(b"payload")?),
        )
        .await;

    assert!(
        matches!(result.outcome.failures(), [FailureReason::KeyNotFound { .. }]),
        "{result:?}"
    );
    assert_eq!(servers.calls_to(PRIMARY_SERVER), 3);
    Ok(())
}

#[tokio::test]
async fn key_server_budget_bounds_lookups() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let servers = Arc::new(FakeKeyServers::default().with(PRIMARY_SERVER, Behavior::Hang));
    let model = model(&signed_component_yaml(
        &signer.signing_fingerprint(),
        &[PRIMARY_SERVER],
    ));
    let resolver = KeyResolver::new(&model.config, Arc::new(KeyCache::in_memory()), servers)
        .with_budget(Some(Duration::from_millis(50)));
    let verifier = Verifier::new(Arc::new(model), Arc::new(resolver));

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        verifier.verify(
            &artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload")
                .with_signature(signer.sign(b"payload")?),
        ),
    )
    .await
    .expect("budget should end the lookup");
    assert!(matches!(
        result.outcome.failures(),
        [FailureReason::KeyNotFound { .. }]
    ));
    Ok(())
}

#[tokio::test]
async fn missing_signature_fails_when_keys_are_declared() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let yaml = signed_component_yaml(&signer.signing_fingerprint(), &[PRIMARY_SERVER]);
    let (verifier, _) = verifier(model(&yaml), Arc::new(FakeKeyServers::default()));

    let result = verifier
        .verify(&artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload"))
        .await;
    assert_eq!(result.outcome, Outcome::failed(FailureReason::MissingSignature));
    Ok(())
}

#[tokio::test]
async fn checksum_and_signature_failures_are_reported_together() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let yaml = format!(
        r#"
configuration:
  verify-signatures: true
components:
  - group: org.example
    name: lib
    version: "1.0"
    pgp: ["{fingerprint}"]
    artifacts:
      - name: lib-1.0.jar
        sha256:
          value: "{digest}"
"#,
        fingerprint = signer.signing_fingerprint(),
        digest = sha256(b"expected"),
    );
    let (verifier, _) = verifier(model(&yaml), Arc::new(FakeKeyServers::default()));

    let result = verifier
        .verify(&artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"tampered"))
        .await;
    match result.outcome.failures() {
        [
            FailureReason::ChecksumMismatch { .. },
            FailureReason::MissingSignature,
        ] => {}
        other => panic!("expected both diagnostics, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn ignored_key_is_rejected_before_lookup() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let fingerprint = signer.signing_fingerprint();
    let long_id = &fingerprint[fingerprint.len() - 16..];
    let yaml = format!(
        r#"
configuration:
  verify-signatures: true
  key-servers:
    uris: ["{PRIMARY_SERVER}"]
  ignored-keys:
    - id: "{long_id}"
      reason: compromised
components:
  - group: org.example
    name: lib
    pgp: ["{fingerprint}"]
"#
    );
    let servers = Arc::new(FakeKeyServers::default().with(PRIMARY_SERVER, Behavior::Serve(signer.public()?)));
    let (verifier, _) = verifier(model(&yaml), Arc::clone(&servers));

    let result = verifier
        .verify(
            &artifact("org.example", "lib", "2.0", "lib-2.0.jar", b"payload")
                .with_signature(signer.sign(b"payload")?),
        )
        .await;
    match result.outcome.failures() {
        [FailureReason::IgnoredKey { reason, .. }] => {
            assert_eq!(reason.as_deref(), Some("compromised"));
        }
        other => panic!("expected ignored key, got {other:?}"),
    }
    assert!(servers.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn disabled_metadata_skips_everything() {
    let model = model(
        r#"
configuration:
  verify-metadata: false
"#,
    );
    let (verifier, _) = verifier(model, Arc::new(FakeKeyServers::default()));
    let result = verifier
        .verify(&artifact("org.any", "thing", "1.0", "thing-1.0.jar", b"bytes"))
        .await;
    assert_eq!(result.outcome, Outcome::Skipped(SkipReason::VerificationDisabled));
}

#[tokio::test]
async fn component_override_is_flagged_as_weakening() {
    let model = model(
        r#"
configuration:
  verify-signatures: true
components:
  - group: org.example
    name: legacy
    verify-metadata: false
"#,
    );
    let (verifier, _) = verifier(model, Arc::new(FakeKeyServers::default()));
    let result = verifier
        .verify(&artifact("org.example", "legacy", "0.9", "legacy-0.9.jar", b"bytes"))
        .await;
    assert_eq!(result.outcome, Outcome::Skipped(SkipReason::VerificationDisabled));
    assert_eq!(result.notices.len(), 1);
    assert_eq!(result.notices[0].flag, WeakenedFlag::VerifyMetadata);
}

#[tokio::test]
async fn metadata_override_does_not_disable_signatures() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let yaml = format!(
        r#"
configuration:
  verify-signatures: true
  key-servers:
    uris: ["{PRIMARY_SERVER}"]
components:
  - group: org.example
    name: legacy
    version: "0.9"
    verify-metadata: false
    pgp: ["{fingerprint}"]
    artifacts:
      - name: legacy-0.9.jar
        sha256:
          value: "{digest}"
"#,
        fingerprint = signer.signing_fingerprint(),
        digest = sha256(b"something else"),
    );
    let servers = Arc::new(
        FakeKeyServers::default().with(PRIMARY_SERVER, Behavior::Serve(signer.public()?)),
    );
    let (verifier, _) = verifier(model(&yaml), servers);

    let unsigned = verifier
        .verify(&artifact("org.example", "legacy", "0.9", "legacy-0.9.jar", b"bytes"))
        .await;
    assert_eq!(unsigned.outcome, Outcome::failed(FailureReason::MissingSignature));
    assert_eq!(unsigned.notices.len(), 1);
    assert_eq!(unsigned.notices[0].flag, WeakenedFlag::VerifyMetadata);

    // Checksums are off for the component, so the stale digest is not consulted.
    let signed = verifier
        .verify(
            &artifact("org.example", "legacy", "0.9", "legacy-0.9.jar", b"bytes")
                .with_signature(signer.sign(b"bytes")?),
        )
        .await;
    assert_eq!(
        signed.outcome,
        Outcome::Verified(VerificationMethod::Signature {
            fingerprint: KeyId::parse(&signer.signing_fingerprint())?,
        })
    );
    Ok(())
}

#[tokio::test]
async fn repeated_verification_gives_identical_results() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let yaml = format!(
        r#"
configuration:
  verify-signatures: true
  key-servers:
    uris: ["{PRIMARY_SERVER}"]
components:
  - group: org.example
    name: lib
    pgp: ["{fingerprint}"]
    artifacts:
      - name: lib-1.0.jar
        sha256:
          value: "{digest}"
"#,
        fingerprint = signer.signing_fingerprint(),
        digest = sha256(b"payload"),
    );
    let servers = Arc::new(
        FakeKeyServers::default().with(PRIMARY_SERVER, Behavior::Serve(signer.public()?)),
    );
    let (verifier, cache) = verifier(model(&yaml), Arc::clone(&servers));
    let signed = artifact("org.example", "lib", "1.0", "lib-1.0.jar", b"payload")
        .with_signature(signer.sign(b"payload")?);

    assert!(cache.is_empty());
    let first = verifier.verify(&signed).await;
    assert_eq!(cache.len(), 1);
    let second = verifier.verify(&signed).await;

    assert!(
        matches!(
            first.outcome,
            Outcome::Verified(VerificationMethod::ChecksumAndSignature { .. })
        ),
        "{first:?}"
    );
    assert_eq!(first, second);
    assert_eq!(servers.calls().len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batch_keeps_order_and_dedups() -> anyhow::Result<()> {
    let signer = Signer::generate("dev@example.org")?;
    let yaml = format!(
        r#"
configuration:
  verify-signatures: true
  key-servers:
    uris: ["{PRIMARY_SERVER}"]
  trusted-artifacts:
    - regex: ".*-sources\\.jar"
components:
  - group: org.example
    name: lib
    pgp: ["{fingerprint}"]
"#,
        fingerprint = signer.signing_fingerprint(),
    );
    let servers = Arc::new(
        FakeKeyServers::default().with(PRIMARY_SERVER, Behavior::Serve(signer.public()?)),
    );
    let (verifier, _) = verifier(model(&yaml), Arc::clone(&servers));

    let mut batch = Vec::new();
    for version in ["1.0", "1.1", "1.2"] {
        let file = format!("lib-{version}.jar");
        let bytes = format!("payload {version}");
        batch.push(
            artifact("org.example", "lib", version, &file, bytes.as_bytes())
                .with_signature(signer.sign(bytes.as_bytes())?),
        );
    }
    batch.push(artifact("org.example", "lib", "1.0", "lib-1.0-sources.jar", b"src"));
    batch.push(artifact("org.other", "unknown", "3.0", "unknown-3.0.jar", b"?"));
    batch.push(batch[0].clone());

    let report = verifier.verify_all(batch).await;

    assert_eq!(report.len(), 5);
    let files: Vec<_> = report
        .results
        .iter()
        .map(|result| result.artifact.file_name.as_str())
        .collect();
    assert_eq!(
        files,
        [
            "lib-1.0.jar",
            "lib-1.1.jar",
            "lib-1.2.jar",
            "lib-1.0-sources.jar",
            "unknown-3.0.jar"
        ]
    );
    let counts = report.counts();
    assert_eq!((counts.verified, counts.trusted, counts.failed), (3, 1, 1));
    assert!(report.should_abort());
    assert!(report.to_string().contains("unknown-3.0.jar"));
    assert!(servers.calls_to(PRIMARY_SERVER) >= 1);
    Ok(())
}
