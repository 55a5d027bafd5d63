use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{Object, ObjectStore, StoreError, validate_id};
use crate::util::hash::hash_bytes;

/// A store that keeps objects in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
  objects: Mutex<HashMap<String, (Object, Vec<u8>)>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Content stored under `id`, if any.
  pub fn content(&self, id: &str) -> Option<Vec<u8>> {
    self
      .objects
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(id)
      .map(|(_, content)| content.clone())
  }

  pub fn len(&self) -> usize {
    self.objects.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[async_trait]
impl ObjectStore for MemoryStore {
  async fn get(&self, id: &str) -> Result<Object, StoreError> {
    validate_id(id)?;
    self
      .objects
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(id)
      .map(|(object, _)| object.clone())
      .ok_or_else(|| StoreError::NotFound(id.to_string()))
  }

  async fn put(&self, id: &str, content: Vec<u8>) -> Result<Object, StoreError> {
    validate_id(id)?;
    let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
    if objects.contains_key(id) {
      return Err(StoreError::Duplicate(id.to_string()));
    }

    let object = Object {
      id: id.to_string(),
      checksum: hash_bytes(&content).0,
      url: format!("memory://{id}"),
    };
    objects.insert(id.to_string(), (object.clone(), content));
    Ok(object)
  }
}
