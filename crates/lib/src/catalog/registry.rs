//! JSON-backed catalog.
//!
//! The document maps each dependency name to its module path, the list of
//! published versions, and whether it needs native-code linkage:
//!
//! ```json
//! {
//!   "k6": { "module": "go.k6.io/k6", "versions": ["v0.49.0", "v0.50.0"] },
//!   "k6/x/sql": { "module": "github.com/grafana/xk6-sql", "versions": ["v0.4.0"], "cgo": true }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Catalog, CatalogError};
use crate::build::{Dependency, Module};
use crate::version::{Constraint, parse_version};

#[derive(Debug, Deserialize)]
struct RawEntry {
  module: String,
  #[serde(default)]
  versions: Vec<String>,
  #[serde(default)]
  cgo: bool,
}

#[derive(Debug, Clone)]
struct Entry {
  path: String,
  /// Parsed version alongside the spelling the catalog uses for it.
  versions: Vec<(Version, String)>,
  cgo: bool,
}

/// An in-memory catalog of known modules and their published versions.
#[derive(Debug, Clone, Default)]
pub struct Registry {
  entries: HashMap<String, Entry>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a module. Later registrations of the same name replace earlier ones.
  pub fn with_module(mut self, name: &str, path: &str, versions: &[&str], cgo: bool) -> Result<Self, CatalogError> {
    let versions = versions.iter().map(|v| v.to_string()).collect();
    let entry = parse_entry(
      name,
      RawEntry {
        module: path.to_string(),
        versions,
        cgo,
      },
    )?;
    self.entries.insert(name.to_string(), entry);
    Ok(self)
  }

  pub fn from_json(json: &str) -> Result<Self, CatalogError> {
    let raw: HashMap<String, RawEntry> = serde_json::from_str(json).map_err(|e| CatalogError::Load {
      location: "<inline>".to_string(),
      message: e.to_string(),
    })?;

    let entries = raw
      .into_iter()
      .map(|(name, entry)| parse_entry(&name, entry).map(|e| (name, e)))
      .collect::<Result<HashMap<_, _>, _>>()?;

    Ok(Self { entries })
  }

  /// Load a catalog from a local file or an `http(s)://` URL.
  pub async fn load(location: &str) -> Result<Self, CatalogError> {
    info!(location, "loading catalog");

    let load_err = |message: String| CatalogError::Load {
      location: location.to_string(),
      message,
    };

    let json = if location.starts_with("http://") || location.starts_with("https://") {
      let response = reqwest::get(location).await.map_err(|e| load_err(e.to_string()))?;
      if !response.status().is_success() {
        return Err(load_err(format!("HTTP {}", response.status())));
      }
      response.text().await.map_err(|e| load_err(e.to_string()))?
    } else {
      tokio::fs::read_to_string(Path::new(location))
        .await
        .map_err(|e| load_err(e.to_string()))?
    };

    let registry = Self::from_json(&json).map_err(|e| match e {
      CatalogError::Load { message, .. } => load_err(message),
      other => other,
    })?;
    debug!(location, modules = registry.entries.len(), "catalog loaded");
    Ok(registry)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

fn parse_entry(name: &str, raw: RawEntry) -> Result<Entry, CatalogError> {
  let versions = raw
    .versions
    .into_iter()
    .map(|v| {
      parse_version(&v)
        .map(|parsed| (parsed, v))
        .map_err(|e| CatalogError::InvalidEntry {
          name: name.to_string(),
          message: e.to_string(),
        })
    })
    .collect::<Result<Vec<_>, _>>()?;

  Ok(Entry {
    path: raw.module,
    versions,
    cgo: raw.cgo,
  })
}

#[async_trait]
impl Catalog for Registry {
  async fn resolve(&self, dependency: &Dependency) -> Result<Module, CatalogError> {
    let entry = self
      .entries
      .get(&dependency.name)
      .ok_or_else(|| CatalogError::UnknownDependency(dependency.name.clone()))?;

    let constraint = Constraint::parse(&dependency.constraints).map_err(|source| CatalogError::InvalidConstraint {
      name: dependency.name.clone(),
      source,
    })?;

    let (_, version) = entry
      .versions
      .iter()
      .filter(|(parsed, _)| constraint.matches(parsed))
      .max_by(|(a, _), (b, _)| a.cmp(b))
      .ok_or_else(|| CatalogError::NotSatisfiable {
        name: dependency.name.clone(),
        constraints: dependency.constraints.clone(),
      })?;

    Ok(Module {
      path: entry.path.clone(),
      version: version.clone(),
      requires_native: entry.cgo,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  const CATALOG: &str = r#"{
    "k6": { "module": "go.k6.io/k6", "versions": ["v0.49.0", "v0.50.0", "v0.51.0-rc.1"] },
    "k6/x/kubernetes": { "module": "github.com/grafana/xk6-kubernetes", "versions": ["v0.8.0", "v0.9.0", "v0.10.0"] },
    "k6/x/sql": { "module": "github.com/grafana/xk6-sql", "versions": ["v0.4.0"], "cgo": true }
  }"#;

  fn registry() -> Registry {
    Registry::from_json(CATALOG).unwrap()
  }

  #[tokio::test]
  async fn resolves_highest_matching_version() {
    let module = registry()
      .resolve(&Dependency::new("k6/x/kubernetes", ">v0.8.0"))
      .await
      .unwrap();

    assert_eq!(module.path, "github.com/grafana/xk6-kubernetes");
    assert_eq!(module.version, "v0.10.0");
    assert!(!module.requires_native);
  }

  #[tokio::test]
  async fn empty_constraint_skips_prereleases() {
    let module = registry().resolve(&Dependency::new("k6", "")).await.unwrap();
    assert_eq!(module.version, "v0.50.0");
  }

  #[tokio::test]
  async fn reports_native_linkage() {
    let module = registry().resolve(&Dependency::new("k6/x/sql", "*")).await.unwrap();
    assert!(module.requires_native);
  }

  #[tokio::test]
  async fn unknown_and_unsatisfiable() {
    let registry = registry();

    assert!(matches!(
      registry.resolve(&Dependency::new("k6/x/nope", "*")).await,
      Err(CatalogError::UnknownDependency(name)) if name == "k6/x/nope"
    ));
    assert!(matches!(
      registry.resolve(&Dependency::new("k6", ">v1.0.0")).await,
      Err(CatalogError::NotSatisfiable { .. })
    ));
    assert!(matches!(
      registry.resolve(&Dependency::new("k6", ">=nonsense")).await,
      Err(CatalogError::InvalidConstraint { .. })
    ));
  }

  #[test]
  fn rejects_invalid_versions_in_document() {
    let result = Registry::from_json(r#"{ "k6": { "module": "go.k6.io/k6", "versions": ["latest"] } }"#);
    assert!(matches!(result, Err(CatalogError::InvalidEntry { name, .. }) if name == "k6"));
  }

  #[test]
  fn builder_registration() {
    let registry = Registry::new()
      .with_module("k6", "go.k6.io/k6", &["v0.50.0"], false)
      .unwrap();
    assert_eq!(registry.len(), 1);
  }

  #[tokio::test]
  async fn loads_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("catalog.json");
    std::fs::write(&path, CATALOG).unwrap();

    let registry = Registry::load(path.to_str().unwrap()).await.unwrap();
    assert_eq!(registry.len(), 3);
  }

  #[tokio::test]
  async fn load_reports_missing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("missing.json");

    let result = Registry::load(path.to_str().unwrap()).await;
    assert!(matches!(result, Err(CatalogError::Load { .. })));
  }
}
