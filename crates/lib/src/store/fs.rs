//! Directory-backed object store.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── objects/
//! │   ├── <id>          # artifact content (immutable)
//! │   └── <id>.json     # metadata marker
//! └── tmp/              # in-progress writes
//! ```
//!
//! Content is written to `tmp/` and moved into place without clobbering, so a
//! second writer for the same id (in this process or another) gets
//! [`StoreError::Duplicate`] and the first object stays intact. Readers never
//! see a partially written object.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use url::Url;

use super::{Object, ObjectStore, StoreError, validate_id};
use crate::util::hash::{hash_bytes, hash_file};

const OBJECTS_DIR: &str = "objects";
const TMP_DIR: &str = "tmp";

/// Metadata marker written next to each object.
#[derive(Debug, Serialize, Deserialize)]
struct ObjectMarker {
  /// Marker format version.
  version: u32,
  /// Full 64-character SHA-256 of the object content.
  checksum: String,
}

#[derive(Debug, Clone)]
pub struct FileStore {
  root: PathBuf,
}

impl FileStore {
  /// A relative `root` is resolved against the current directory.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    let root = std::path::absolute(&root).unwrap_or(root);
    Self { root }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn object_path(&self, id: &str) -> PathBuf {
    self.root.join(OBJECTS_DIR).join(id)
  }

  fn marker_path(&self, id: &str) -> PathBuf {
    self.root.join(OBJECTS_DIR).join(format!("{id}.json"))
  }

  fn object(&self, id: &str, checksum: String) -> Result<Object, StoreError> {
    let path = self.object_path(id);
    let url = Url::from_file_path(&path).map_err(|()| StoreError::InvalidPath(path.clone()))?;
    Ok(Object {
      id: id.to_string(),
      checksum,
      url: url.to_string(),
    })
  }

  fn get_blocking(&self, id: &str) -> Result<Object, StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
      id: id.to_string(),
      source,
    };

    let path = self.object_path(id);
    match std::fs::metadata(&path) {
      Ok(_) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound(id.to_string())),
      Err(e) => return Err(io_err(e)),
    }

    let checksum = match read_marker(&self.marker_path(id)) {
      Some(marker) => marker.checksum,
      None => {
        debug!(id, "object marker missing, hashing content");
        hash_file(&path).map_err(io_err)?.0
      }
    };

    self.object(id, checksum)
  }

  fn put_blocking(&self, id: &str, content: &[u8]) -> Result<Object, StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
      id: id.to_string(),
      source,
    };

    let objects_dir = self.root.join(OBJECTS_DIR);
    let tmp_dir = self.root.join(TMP_DIR);
    std::fs::create_dir_all(&objects_dir).map_err(io_err)?;
    std::fs::create_dir_all(&tmp_dir).map_err(io_err)?;

    let checksum = hash_bytes(content).0;

    let mut tmp = NamedTempFile::new_in(&tmp_dir).map_err(io_err)?;
    tmp.write_all(content).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;

    if let Err(e) = tmp.persist_noclobber(self.object_path(id)) {
      if e.error.kind() == io::ErrorKind::AlreadyExists {
        return Err(StoreError::Duplicate(id.to_string()));
      }
      return Err(io_err(e.error));
    }

    let marker = ObjectMarker {
      version: 1,
      checksum: checksum.clone(),
    };
    if let Err(e) = write_marker(&tmp_dir, &self.marker_path(id), &marker) {
      // The object is in place; readers fall back to hashing its content.
      warn!(id, error = %e, "failed to write object marker");
    }

    self.object(id, checksum)
  }
}

fn read_marker(path: &Path) -> Option<ObjectMarker> {
  let content = std::fs::read_to_string(path).ok()?;
  serde_json::from_str(&content).ok()
}

fn write_marker(tmp_dir: &Path, path: &Path, marker: &ObjectMarker) -> io::Result<()> {
  let mut tmp = NamedTempFile::new_in(tmp_dir)?;
  serde_json::to_writer(&mut tmp, marker).map_err(io::Error::other)?;
  tmp.write_all(b"\n")?;
  tmp.persist(path).map_err(|e| e.error)?;
  Ok(())
}

#[async_trait]
impl ObjectStore for FileStore {
  async fn get(&self, id: &str) -> Result<Object, StoreError> {
    validate_id(id)?;
    let store = self.clone();
    let owned_id = id.to_string();
    tokio::task::spawn_blocking(move || store.get_blocking(&owned_id))
      .await
      .map_err(|e| StoreError::Io {
        id: id.to_string(),
        source: io::Error::other(e),
      })?
  }

  async fn put(&self, id: &str, content: Vec<u8>) -> Result<Object, StoreError> {
    validate_id(id)?;
    let store = self.clone();
    let owned_id = id.to_string();
    tokio::task::spawn_blocking(move || store.put_blocking(&owned_id, &content))
      .await
      .map_err(|e| StoreError::Io {
        id: id.to_string(),
        source: io::Error::other(e),
      })?
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn get_missing_is_not_found() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    assert!(store.get("abc").await.unwrap_err().is_not_found());
  }

  #[tokio::test]
  async fn put_writes_object_and_marker() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    let object = store.put("abc", b"binary".to_vec()).await.unwrap();

    assert_eq!(std::fs::read(store.object_path("abc")).unwrap(), b"binary");
    assert_eq!(object.checksum, hash_bytes(b"binary").0);
    assert!(object.url.starts_with("file://"));
    assert!(object.url.ends_with("abc"));

    let marker = read_marker(&store.marker_path("abc")).unwrap();
    assert_eq!(marker.version, 1);
    assert_eq!(marker.checksum, object.checksum);
  }

  #[tokio::test]
  async fn get_returns_put_metadata() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    let put = store.put("abc", b"binary".to_vec()).await.unwrap();
    let got = store.get("abc").await.unwrap();
    assert_eq!(put, got);
  }

  #[tokio::test]
  async fn second_put_is_duplicate_and_keeps_first() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());
    store.put("abc", b"first".to_vec()).await.unwrap();

    // A second store over the same directory stands in for another process.
    let other = FileStore::new(temp.path());
    let err = other.put("abc", b"second".to_vec()).await.unwrap_err();

    assert!(err.is_duplicate());
    assert_eq!(std::fs::read(store.object_path("abc")).unwrap(), b"first");
  }

  #[tokio::test]
  async fn missing_marker_falls_back_to_hashing() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());
    store.put("abc", b"binary".to_vec()).await.unwrap();
    std::fs::remove_file(store.marker_path("abc")).unwrap();

    let object = store.get("abc").await.unwrap();
    assert_eq!(object.checksum, hash_bytes(b"binary").0);
  }

  #[tokio::test]
  async fn url_points_at_the_object_file() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    let object = store.put("abc", b"binary".to_vec()).await.unwrap();

    let url = Url::parse(&object.url).unwrap();
    assert_eq!(url.scheme(), "file");
    assert_eq!(url.to_file_path().unwrap(), store.object_path("abc"));
  }

  #[test]
  fn relative_root_is_made_absolute() {
    let store = FileStore::new("relative-store");

    assert!(store.root().is_absolute());
    assert!(store.root().ends_with("relative-store"));

    let object = store.object("abc", String::new()).unwrap();
    let url = Url::parse(&object.url).unwrap();
    assert!(url.host().is_none());
    assert_eq!(url.to_file_path().unwrap(), store.object_path("abc"));
  }

  #[tokio::test]
  async fn root_with_spaces_is_percent_encoded() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("my store"));

    let object = store.put("abc", b"binary".to_vec()).await.unwrap();

    assert!(!object.url.contains(' '));
    assert!(object.url.contains("my%20store"));
    assert_eq!(
      Url::parse(&object.url).unwrap().to_file_path().unwrap(),
      store.object_path("abc")
    );
  }

  #[tokio::test]
  async fn rejects_unsafe_ids() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    assert!(matches!(
      store.put("../x", b"x".to_vec()).await,
      Err(StoreError::InvalidId(_))
    ));
  }
}
