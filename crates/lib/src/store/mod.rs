//! Content-addressed object storage for built artifacts.
//!
//! Objects are keyed by artifact id. A store reports a missing object with
//! [`StoreError::NotFound`] (the cache-miss signal) and a write to an existing
//! id with [`StoreError::Duplicate`] (another writer got there first); any
//! other error is an access failure.
//!
//! # Submodules
//!
//! - [`fs`] - Directory-backed store
//! - [`memory`] - In-process store

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fs::FileStore;
pub use memory::MemoryStore;

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
  pub id: String,
  /// SHA-256 of the object content.
  pub checksum: String,
  /// Where the object can be downloaded from.
  pub url: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("object not found: {0}")]
  NotFound(String),

  #[error("duplicate object: {0}")]
  Duplicate(String),

  #[error("invalid object id '{0}'")]
  InvalidId(String),

  #[error("object path {} cannot be expressed as a file URL", .0.display())]
  InvalidPath(std::path::PathBuf),

  #[error("store io error for {id}: {source}")]
  Io {
    id: String,
    #[source]
    source: std::io::Error,
  },
}

impl StoreError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound(_))
  }

  pub fn is_duplicate(&self) -> bool {
    matches!(self, Self::Duplicate(_))
  }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
  async fn get(&self, id: &str) -> Result<Object, StoreError>;

  /// Store `content` under `id`. Fails with [`StoreError::Duplicate`] if the
  /// id already exists; existing objects are never overwritten.
  async fn put(&self, id: &str, content: Vec<u8>) -> Result<Object, StoreError>;
}

/// Ids are restricted to characters that are safe as a single path component.
pub(crate) fn validate_id(id: &str) -> Result<(), StoreError> {
  let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if valid {
    Ok(())
  } else {
    Err(StoreError::InvalidId(id.to_string()))
  }
}
