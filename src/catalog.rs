use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

use crate::types::{PortValue, ProbeRequest};

/// Read-only view of the portal's record store.
///
/// The store is a JSON document shaped `{ "projects": [...], "environments": [...] }`.
/// Only the environment fields that matter for probing are read; everything
/// else in the records is ignored.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Catalog {
    #[serde(default, deserialize_with = "null_as_default")]
    pub environments: Vec<CatalogEntry>,
}

/// One environment record, as far as probing is concerned.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub port: Option<PortValue>,
    #[serde(default)]
    pub http_method: Option<String>,
    /// Ids of the projects this environment belongs to.
    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: Vec<String>,
}

impl CatalogEntry {
    /// Build the probe request this entry describes. Not validated here.
    pub fn probe_request(&self) -> ProbeRequest {
        ProbeRequest {
            protocol: self.protocol.clone(),
            target: self.url.clone(),
            port: self.port.clone(),
            method: self.http_method.clone(),
        }
    }
}

impl Catalog {
    /// Environments linked to `project_id`.
    pub fn for_project(&self, project_id: &str) -> Vec<CatalogEntry> {
        self.environments
            .iter()
            .filter(|e| e.projects.iter().any(|p| p == project_id))
            .cloned()
            .collect()
    }
}

pub fn parse_catalog_str(s: &str) -> Result<Catalog> {
    serde_json::from_str(s).context("invalid catalog document")
}

/// Load the catalog from a file path. Errors if the file cannot be read or parsed.
pub fn load_catalog_from_path(path: impl AsRef<Path>) -> Result<Catalog> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read catalog file: {}", path.as_ref().display()))?;
    parse_catalog_str(&content)
        .with_context(|| format!("failed to parse catalog file: {}", path.as_ref().display()))
}

/// Load the catalog, or an empty one if the file is missing or unreadable.
///
/// A missing file is an empty store. Any other failure is logged, since it
/// hides environments that do exist.
pub fn load_catalog_or_empty(path: impl AsRef<Path>) -> Catalog {
    match load_catalog_from_path(path) {
        Ok(catalog) => catalog,
        Err(e) => {
            let missing = e
                .downcast_ref::<io::Error>()
                .is_some_and(|err| err.kind() == io::ErrorKind::NotFound);
            if !missing {
                warn!("catalog unusable, treating it as empty: {e:#}");
            }
            Catalog::default()
        }
    }
}

// Records written by older forms carry explicit nulls for empty fields.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
