use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::MetadataError;
use crate::model::TrustModel;
use crate::schema::VerificationDocument;

/// Serialized form of the verification metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Pick a format from the file extension, defaulting to YAML.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Load a [`TrustModel`] from JSON or YAML.
pub fn load_trust_model(path: &Path) -> Result<TrustModel, MetadataError> {
    let content = fs::read_to_string(path)?;
    let model = parse_trust_model(path, &content)?;
    debug!(
        path = %path.display(),
        components = model.components.len(),
        exemptions = model.exemptions.len(),
        "loaded verification metadata"
    );
    Ok(model)
}

pub fn parse_trust_model(path: &Path, content: &str) -> Result<TrustModel, MetadataError> {
    let document: VerificationDocument = if is_json(path, content) {
        serde_json::from_str(content)?
    } else {
        serde_yaml_bw::from_str(content)?
    };
    TrustModel::try_from(document)
}

pub fn to_string(model: &TrustModel, format: Format) -> Result<String, MetadataError> {
    let document = VerificationDocument::from(model);
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(&document)?),
        Format::Yaml => Ok(serde_yaml_bw::to_string(&document)?),
    }
}

/// Write `model` to `path`, in the format its extension implies.
pub fn save_trust_model(model: &TrustModel, path: &Path) -> Result<(), MetadataError> {
    let content = to_string(model, Format::for_path(path))?;
    fs::write(path, content)?;
    Ok(())
}

/// JSON by extension, else by a leading `{`. YAML otherwise.
pub fn is_json(path: &Path, content: &str) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if matches!(ext, "json") {
            return true;
        }
        if matches!(ext, "yaml" | "yml") {
            return false;
        }
    }

    content
        .chars()
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| c == '{')
}
