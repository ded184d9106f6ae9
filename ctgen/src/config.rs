//! Image and step declarations.
//!
//! Both lists are loaded once and treated as trusted input afterwards.
//! The format is chosen by extension: `.yaml`/`.yml` is YAML, anything
//! else is JSON.

use crate::errors::{CtgenError, CtgenResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One cloud image to turn into a template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Numeric VM id, substituted into `{{.ID}}`.
    pub id: u32,
    /// File name in the image cache and display name.
    pub name: String,
    pub url: String,
    /// Vendor checksum manifest. Empty means the cached file is trusted.
    #[serde(default)]
    pub checksum_url: String,
    #[serde(default)]
    pub tags: String,
    pub vendor: String,
}

impl ImageSpec {
    pub fn has_checksum(&self) -> bool {
        !self.checksum_url.trim().is_empty()
    }

    /// Last path segment of the source URL.
    ///
    /// Vendor manifests list the upstream file name, which may differ from
    /// the local `name`.
    pub fn url_filename(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// One provisioning command shared by every image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    /// Command template; may contain `{{.ID}}`, `{{.Name}}`, `{{.Tags}}`,
    /// `{{.Vendor}}` and `{{.FilePath}}`.
    pub command: String,
}

pub fn load_images(path: &Path) -> CtgenResult<Vec<ImageSpec>> {
    load_list(path, "images")
}

pub fn load_steps(path: &Path) -> CtgenResult<Vec<StepSpec>> {
    load_list(path, "steps")
}

fn load_list<T: DeserializeOwned>(path: &Path, what: &str) -> CtgenResult<Vec<T>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CtgenError::Config(format!(
            "Failed to read {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })?;

    let parsed = if is_yaml(path) {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    };

    let items: Vec<T> = parsed.map_err(|e| {
        CtgenError::Config(format!("Failed to parse {} file {}: {}", what, path.display(), e))
    })?;

    tracing::debug!(file = %path.display(), count = items.len(), "Loaded {}", what);
    Ok(items)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
