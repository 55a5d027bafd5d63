use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::consts::BASE_NAME;

/// A requested dependency with a version-range expression, not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
  pub name: String,
  pub constraints: String,
}

impl Dependency {
  pub fn new(name: impl Into<String>, constraints: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      constraints: constraints.into(),
    }
  }
}

/// The concrete identity of one dependency (or of the base program) after
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Module {
  pub path: String,
  pub version: String,
  #[serde(default)]
  pub requires_native: bool,
}

/// The base program plus every requested dependency, keyed by name.
///
/// The base program is held apart from the other entries so the set always
/// has exactly one of it; it is reported under [`BASE_NAME`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSet {
  base: Module,
  deps: BTreeMap<String, Module>,
}

impl ResolvedSet {
  pub fn new(base: Module) -> Self {
    Self {
      base,
      deps: BTreeMap::new(),
    }
  }

  /// Adds a resolved dependency, returning the module it replaced if the name
  /// was already present.
  pub fn insert(&mut self, name: impl Into<String>, module: Module) -> Option<Module> {
    self.deps.insert(name.into(), module)
  }

  pub fn base(&self) -> &Module {
    &self.base
  }

  /// Non-base dependencies in ascending name order.
  pub fn dependencies(&self) -> impl Iterator<Item = (&str, &Module)> {
    self.deps.iter().map(|(name, module)| (name.as_str(), module))
  }

  /// Every entry, base program first, then dependencies in ascending name order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &Module)> {
    std::iter::once((BASE_NAME, &self.base)).chain(self.dependencies())
  }

  pub fn requires_native(&self) -> bool {
    self.deps.values().any(|m| m.requires_native)
  }

  /// Name to resolved version, including the base program.
  pub fn versions(&self) -> BTreeMap<String, String> {
    self
      .iter()
      .map(|(name, module)| (name.to_string(), module.version.clone()))
      .collect()
  }
}

/// A built binary: where to fetch it and exactly what went into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
  pub id: String,
  pub checksum: String,
  pub url: String,
  pub dependencies: BTreeMap<String, String>,
  pub platform: String,
}
