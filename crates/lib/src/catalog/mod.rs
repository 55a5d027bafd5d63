//! Dependency catalog.
//!
//! A catalog maps a dependency name and a version-range expression to one
//! concrete module. The builder only relies on the [`Catalog`] trait; the
//! [`Registry`] implementation reads a JSON document of known modules.

mod registry;

use async_trait::async_trait;
use thiserror::Error;

use crate::build::{Dependency, Module};
use crate::version::ConstraintError;

pub use registry::Registry;

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("unknown dependency '{0}'")]
  UnknownDependency(String),

  #[error("no version of '{name}' satisfies '{constraints}'")]
  NotSatisfiable { name: String, constraints: String },

  #[error("invalid constraint for '{name}': {source}")]
  InvalidConstraint {
    name: String,
    #[source]
    source: ConstraintError,
  },

  #[error("failed to load catalog from {location}: {message}")]
  Load { location: String, message: String },

  #[error("invalid catalog entry '{name}': {message}")]
  InvalidEntry { name: String, message: String },
}

#[async_trait]
pub trait Catalog: Send + Sync {
  /// Resolve one dependency to the module that satisfies its constraints.
  async fn resolve(&self, dependency: &Dependency) -> Result<Module, CatalogError>;
}
