//! Serialized shape of the verification metadata.
//!
//! Field names follow the `verification-metadata` vocabulary (`verify-metadata`,
//! `also-trust`, `trusted-artifacts`, ...). These types are the only place the
//! names live; the codec reads and writes them and [`TrustModel`] is built
//! from them.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::checksum::ChecksumAlgorithm;
use crate::error::MetadataError;
use crate::keys::KeyId;
use crate::model::{
    ArtifactPattern, ChecksumDeclaration, ComponentEntry, ComponentId, FileMatcher, IgnoredKey,
    LocalOverride, Scope, SignatureTrust, TrustModel, TrustedArtifactExemption, TrustedKey,
    VerificationConfig,
};

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct VerificationDocument {
    #[serde(default)]
    pub configuration: ConfigurationSection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentSection>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigurationSection {
    #[serde(default = "default_true")]
    pub verify_metadata: bool,
    #[serde(default)]
    pub verify_signatures: bool,
    #[serde(default)]
    pub key_servers: KeyServersSection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_artifacts: Vec<TrustSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_keys: Vec<TrustedKeySection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_keys: Vec<IgnoredKeySection>,
}

impl Default for ConfigurationSection {
    fn default() -> Self {
        Self {
            verify_metadata: true,
            verify_signatures: false,
            key_servers: KeyServersSection::default(),
            trusted_artifacts: Vec::new(),
            trusted_keys: Vec::new(),
            ignored_keys: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct KeyServersSection {
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,
}

impl Default for KeyServersSection {
    fn default() -> Self {
        Self {
            enabled: true,
            uris: Vec::new(),
        }
    }
}

/// A `trusted-artifacts` rule.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TrustSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TrustedKeySection {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct IgnoredKeySection {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ComponentSection {
    pub group: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_metadata: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_signatures: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pgp: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactSection>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ArtifactSection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<ChecksumSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<ChecksumSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<ChecksumSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha512: Option<ChecksumSection>,
}

impl ArtifactSection {
    fn checksums(&self) -> impl Iterator<Item = (ChecksumAlgorithm, &ChecksumSection)> {
        [
            (ChecksumAlgorithm::Md5, self.md5.as_ref()),
            (ChecksumAlgorithm::Sha1, self.sha1.as_ref()),
            (ChecksumAlgorithm::Sha256, self.sha256.as_ref()),
            (ChecksumAlgorithm::Sha512, self.sha512.as_ref()),
        ]
        .into_iter()
        .filter_map(|(algorithm, section)| section.map(|section| (algorithm, section)))
    }

    fn slot(&mut self, algorithm: ChecksumAlgorithm) -> &mut Option<ChecksumSection> {
        match algorithm {
            ChecksumAlgorithm::Md5 => &mut self.md5,
            ChecksumAlgorithm::Sha1 => &mut self.sha1,
            ChecksumAlgorithm::Sha256 => &mut self.sha256,
            ChecksumAlgorithm::Sha512 => &mut self.sha512,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ChecksumSection {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_trust: Vec<String>,
}

impl TryFrom<VerificationDocument> for TrustModel {
    type Error = MetadataError;

    fn try_from(document: VerificationDocument) -> Result<Self, Self::Error> {
        let VerificationDocument {
            configuration,
            components: component_sections,
        } = document;

        let key_servers = configuration
            .key_servers
            .uris
            .iter()
            .map(|uri| Url::parse(uri).map_err(|err| MetadataError::invalid_key_server(uri, err)))
            .collect::<Result<Vec<_>, _>>()?;

        let exemptions = configuration
            .trusted_artifacts
            .into_iter()
            .map(|trust| {
                Ok(TrustedArtifactExemption {
                    kind: file_matcher(trust.file, trust.regex)?
                        .ok_or(MetadataError::AmbiguousExemption)?,
                    scope: Scope {
                        group: trust.group,
                        name: trust.name,
                        version: trust.version,
                    },
                    reason: trust.reason,
                })
            })
            .collect::<Result<Vec<_>, MetadataError>>()?;

        let trusted_keys = configuration
            .trusted_keys
            .into_iter()
            .map(|key| {
                Ok(TrustedKey {
                    id: KeyId::parse(&key.id)?,
                    scope: Scope {
                        group: key.group,
                        name: key.name,
                        version: key.version,
                    },
                    file: file_matcher(key.file, key.regex)?,
                })
            })
            .collect::<Result<Vec<_>, MetadataError>>()?;

        let ignored_keys = configuration
            .ignored_keys
            .into_iter()
            .map(|key| {
                Ok(IgnoredKey {
                    id: KeyId::parse(&key.id)?,
                    reason: key.reason,
                })
            })
            .collect::<Result<Vec<_>, MetadataError>>()?;

        let mut components = IndexMap::with_capacity(component_sections.len());
        for section in component_sections {
            let (id, entry) = component_entry(section)?;
            match components.entry(id) {
                Entry::Occupied(occupied) => {
                    return Err(MetadataError::DuplicateComponent(occupied.key().clone()));
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(entry);
                }
            }
        }

        Ok(TrustModel {
            config: VerificationConfig {
                verify_metadata: configuration.verify_metadata,
                verify_signatures: configuration.verify_signatures,
                key_servers,
                key_servers_enabled: configuration.key_servers.enabled,
            },
            components,
            exemptions,
            trusted_keys,
            ignored_keys,
        })
    }
}

fn file_matcher(
    file: Option<String>,
    regex: Option<String>,
) -> Result<Option<FileMatcher>, MetadataError> {
    match (file, regex) {
        (None, None) => Ok(None),
        (Some(file), None) => Ok(Some(FileMatcher::Exact(file))),
        (None, Some(regex)) => Ok(Some(FileMatcher::Pattern(ArtifactPattern::new(regex)?))),
        (Some(_), Some(_)) => Err(MetadataError::AmbiguousExemption),
    }
}

fn component_entry(section: ComponentSection) -> Result<(ComponentId, ComponentEntry), MetadataError> {
    if section.group.trim().is_empty() {
        return Err(MetadataError::EmptyCoordinate("group"));
    }
    if section.name.trim().is_empty() {
        return Err(MetadataError::EmptyCoordinate("name"));
    }
    let id = ComponentId {
        group: section.group,
        name: section.name,
        version: section.version.filter(|version| !version.trim().is_empty()),
    };

    let signatures = if section.pgp.is_empty() {
        None
    } else {
        let trusted_keys = section
            .pgp
            .iter()
            .map(|raw| KeyId::parse(raw))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Some(SignatureTrust { trusted_keys })
    };

    let mut artifacts: IndexMap<String, Vec<ChecksumDeclaration>> = IndexMap::new();
    for artifact in &section.artifacts {
        for (algorithm, checksum) in artifact.checksums() {
            let declaration = checksum_declaration(&id, &artifact.name, algorithm, checksum)?;
            artifacts
                .entry(artifact.name.clone())
                .or_default()
                .push(declaration);
        }
    }

    let entry = ComponentEntry {
        artifacts,
        signatures,
        local: LocalOverride {
            verify_metadata: section.verify_metadata,
            verify_signatures: section.verify_signatures,
        },
    };
    Ok((id, entry))
}

fn checksum_declaration(
    component: &ComponentId,
    artifact: &str,
    algorithm: ChecksumAlgorithm,
    section: &ChecksumSection,
) -> Result<ChecksumDeclaration, MetadataError> {
    let normalize = |raw: &str| -> Result<String, MetadataError> {
        let value = raw.trim().to_ascii_lowercase();
        if value.is_empty() {
            return Err(MetadataError::EmptyChecksum {
                component: component.clone(),
                artifact: artifact.to_string(),
                algorithm,
            });
        }
        if !algorithm.is_valid_digest(&value) {
            return Err(MetadataError::InvalidChecksum {
                component: component.clone(),
                artifact: artifact.to_string(),
                algorithm,
                value,
                expected_len: algorithm.hex_len(),
            });
        }
        Ok(value)
    };

    Ok(ChecksumDeclaration {
        algorithm,
        value: normalize(&section.value)?,
        origin: section.origin.clone(),
        also_trust: section
            .also_trust
            .iter()
            .map(|value| normalize(value))
            .collect::<Result<_, _>>()?,
    })
}

impl From<&TrustModel> for VerificationDocument {
    fn from(model: &TrustModel) -> Self {
        let scope_fields = |scope: &Scope| (scope.group.clone(), scope.name.clone(), scope.version.clone());
        let matcher_fields = |matcher: Option<&FileMatcher>| match matcher {
            None => (None, None),
            Some(FileMatcher::Exact(file)) => (Some(file.clone()), None),
            Some(FileMatcher::Pattern(pattern)) => (None, Some(pattern.as_str().to_string())),
        };

        let trusted_artifacts = model
            .exemptions
            .iter()
            .map(|exemption| {
                let (group, name, version) = scope_fields(&exemption.scope);
                let (file, regex) = matcher_fields(Some(&exemption.kind));
                TrustSection {
                    group,
                    name,
                    version,
                    file,
                    regex,
                    reason: exemption.reason.clone(),
                }
            })
            .collect();

        let trusted_keys = model
            .trusted_keys
            .iter()
            .map(|key| {
                let (group, name, version) = scope_fields(&key.scope);
                let (file, regex) = matcher_fields(key.file.as_ref());
                TrustedKeySection {
                    id: key.id.to_string(),
                    group,
                    name,
                    version,
                    file,
                    regex,
                }
            })
            .collect();

        let ignored_keys = model
            .ignored_keys
            .iter()
            .map(|key| IgnoredKeySection {
                id: key.id.to_string(),
                reason: key.reason.clone(),
            })
            .collect();

        let components = model
            .components
            .iter()
            .map(|(id, entry)| ComponentSection {
                group: id.group.clone(),
                name: id.name.clone(),
                version: id.version.clone(),
                verify_metadata: entry.local.verify_metadata,
                verify_signatures: entry.local.verify_signatures,
                pgp: entry
                    .signatures
                    .iter()
                    .flat_map(|trust| trust.trusted_keys.iter().map(KeyId::to_string))
                    .collect(),
                artifacts: entry
                    .artifacts
                    .iter()
                    .map(|(name, declarations)| {
                        let mut section = ArtifactSection {
                            name: name.clone(),
                            ..ArtifactSection::default()
                        };
                        for declaration in declarations {
                            *section.slot(declaration.algorithm) = Some(ChecksumSection {
                                value: declaration.value.clone(),
                                origin: declaration.origin.clone(),
                                also_trust: declaration.also_trust.clone(),
                            });
                        }
                        section
                    })
                    .collect(),
            })
            .collect();

        VerificationDocument {
            configuration: ConfigurationSection {
                verify_metadata: model.config.verify_metadata,
                verify_signatures: model.config.verify_signatures,
                key_servers: KeyServersSection {
                    enabled: model.config.key_servers_enabled,
                    uris: model
                        .config
                        .key_servers
                        .iter()
                        .map(|uri| uri.to_string())
                        .collect(),
                },
                trusted_artifacts,
                trusted_keys,
                ignored_keys,
            },
            components,
        }
    }
}
