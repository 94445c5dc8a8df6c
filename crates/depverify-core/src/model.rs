use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use regex::Regex;
use url::Url;

use crate::checksum::ChecksumAlgorithm;
use crate::error::MetadataError;
use crate::keys::KeyId;

/// Global verification switches and key servers.
#[derive(Clone, Debug)]
pub struct VerificationConfig {
    pub verify_metadata: bool,
    pub verify_signatures: bool,
    /// Queried in this order when a key is not cached.
    pub key_servers: Vec<Url>,
    pub key_servers_enabled: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            verify_metadata: true,
            verify_signatures: false,
            key_servers: Vec::new(),
            key_servers_enabled: true,
        }
    }
}

/// Module coordinates. A `None` version applies to every version of the module.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId {
    pub group: String,
    pub name: String,
    pub version: Option<String>,
}

impl ComponentId {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: Some(version.into()),
        }
    }

    pub fn any_version(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: None,
        }
    }

    /// The id with its version dropped.
    pub fn without_version(&self) -> Self {
        Self::any_version(self.group.clone(), self.name.clone())
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}:{}", self.group, self.name, version),
            None => write!(f, "{}:{}:*", self.group, self.name),
        }
    }
}

/// A resolved artifact as handed over by the dependency pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactRef {
    pub component: ComponentId,
    pub file_name: String,
}

impl ArtifactRef {
    pub fn new(component: ComponentId, file_name: impl Into<String>) -> Self {
        Self {
            component,
            file_name: file_name.into(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.file_name, self.component)
    }
}

/// Expected digest for one artifact file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecksumDeclaration {
    pub algorithm: ChecksumAlgorithm,
    /// Lowercase hex.
    pub value: String,
    pub origin: Option<String>,
    /// Digests of alternate legitimate builds of the same artifact.
    pub also_trust: Vec<String>,
}

impl ChecksumDeclaration {
    pub fn accepted_values(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.value.as_str()).chain(self.also_trust.iter().map(String::as_str))
    }
}

/// Keys allowed to sign artifacts of a component.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureTrust {
    pub trusted_keys: BTreeSet<KeyId>,
}

impl SignatureTrust {
    pub fn is_trusted(&self, issuer: &KeyId) -> bool {
        self.trusted_keys.iter().any(|key| key.matches(issuer))
    }
}

/// Component-scoped replacement for the global verify flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LocalOverride {
    pub verify_metadata: Option<bool>,
    pub verify_signatures: Option<bool>,
}

impl LocalOverride {
    pub fn is_empty(&self) -> bool {
        self.verify_metadata.is_none() && self.verify_signatures.is_none()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ComponentEntry {
    /// Checksums keyed by artifact file name.
    pub artifacts: IndexMap<String, Vec<ChecksumDeclaration>>,
    pub signatures: Option<SignatureTrust>,
    pub local: LocalOverride,
}

impl ComponentEntry {
    pub fn checksums(&self, file_name: &str) -> &[ChecksumDeclaration] {
        self.artifacts
            .get(file_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Group/name/version restriction. Unset fields match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    pub group: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
}

impl Scope {
    pub fn matches(&self, component: &ComponentId) -> bool {
        fn field(rule: &Option<String>, actual: Option<&str>) -> bool {
            match rule {
                None => true,
                Some(expected) => actual == Some(expected.as_str()),
            }
        }

        field(&self.group, Some(&component.group))
            && field(&self.name, Some(&component.name))
            && field(&self.version, component.version.as_deref())
    }
}

/// A file name regex, matched against the whole name.
#[derive(Clone, Debug)]
pub struct ArtifactPattern {
    source: String,
    regex: Regex,
}

impl ArtifactPattern {
    pub fn new(source: impl Into<String>) -> Result<Self, MetadataError> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{source})$"))
            .map_err(|err| MetadataError::invalid_pattern(&source, err))?;
        Ok(Self { source, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, file_name: &str) -> bool {
        self.regex.is_match(file_name)
    }
}

impl PartialEq for ArtifactPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for ArtifactPattern {}

/// How a rule selects artifact files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileMatcher {
    Exact(String),
    Pattern(ArtifactPattern),
}

impl FileMatcher {
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            Self::Exact(name) => name == file_name,
            Self::Pattern(pattern) => pattern.is_match(file_name),
        }
    }
}

impl fmt::Display for FileMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(name) => write!(f, "file `{name}`"),
            Self::Pattern(pattern) => write!(f, "regex `{}`", pattern.as_str()),
        }
    }
}

/// Artifacts accepted without checksum or signature checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustedArtifactExemption {
    pub kind: FileMatcher,
    pub scope: Scope,
    pub reason: Option<String>,
}

impl TrustedArtifactExemption {
    pub fn matches(&self, artifact: &ArtifactRef) -> bool {
        self.scope.matches(&artifact.component) && self.kind.matches(&artifact.file_name)
    }
}

/// A signing key trusted for every artifact its scope selects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustedKey {
    pub id: KeyId,
    pub scope: Scope,
    pub file: Option<FileMatcher>,
}

impl TrustedKey {
    pub fn applies_to(&self, artifact: &ArtifactRef) -> bool {
        self.scope.matches(&artifact.component)
            && self
                .file
                .as_ref()
                .is_none_or(|file| file.matches(&artifact.file_name))
    }
}

/// A key whose signatures are never accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IgnoredKey {
    pub id: KeyId,
    pub reason: Option<String>,
}

/// Root of the verification metadata. Read-only once a session starts.
#[derive(Clone, Debug, Default)]
pub struct TrustModel {
    pub config: VerificationConfig,
    pub components: IndexMap<ComponentId, ComponentEntry>,
    /// Evaluated in declaration order.
    pub exemptions: Vec<TrustedArtifactExemption>,
    pub trusted_keys: Vec<TrustedKey>,
    pub ignored_keys: Vec<IgnoredKey>,
}

impl TrustModel {
    /// Entries that apply to `component`: the exact version first, then the
    /// any-version entry.
    pub fn entries_for(&self, component: &ComponentId) -> impl Iterator<Item = &ComponentEntry> {
        let exact = component
            .version
            .as_ref()
            .and_then(|_| self.components.get(component));
        let wildcard = self.components.get(&component.without_version());
        exact.into_iter().chain(wildcard)
    }

    /// Checksums declared for an artifact, from the most specific entry declaring any.
    pub fn checksums_for(&self, artifact: &ArtifactRef) -> &[ChecksumDeclaration] {
        self.entries_for(&artifact.component)
            .map(|entry| entry.checksums(&artifact.file_name))
            .find(|checksums| !checksums.is_empty())
            .unwrap_or_default()
    }

    /// Component override, field by field from the most specific entry setting it.
    pub fn local_override(&self, component: &ComponentId) -> LocalOverride {
        self.entries_for(component)
            .fold(LocalOverride::default(), |acc, entry| LocalOverride {
                verify_metadata: acc.verify_metadata.or(entry.local.verify_metadata),
                verify_signatures: acc.verify_signatures.or(entry.local.verify_signatures),
            })
    }

    /// Every key trusted to sign `artifact`: component declarations plus
    /// matching global trusted keys.
    pub fn trusted_keys_for(&self, artifact: &ArtifactRef) -> BTreeSet<KeyId> {
        let component_keys = self
            .entries_for(&artifact.component)
            .filter_map(|entry| entry.signatures.as_ref())
            .flat_map(|trust| trust.trusted_keys.iter().cloned());
        let global_keys = self
            .trusted_keys
            .iter()
            .filter(|key| key.applies_to(artifact))
            .map(|key| key.id.clone());
        component_keys.chain(global_keys).collect()
    }

    pub fn ignored_key(&self, issuer: &KeyId) -> Option<&IgnoredKey> {
        self.ignored_keys.iter().find(|ignored| ignored.id.matches(issuer))
    }
}
