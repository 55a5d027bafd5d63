//! Artifact identity.
//!
//! An artifact id is the SHA-256 of the target platform and every resolved
//! `(name, version)` pair, base program first and the rest in ascending name
//! order. Each field is length-prefixed so no two distinct inputs share an
//! encoding.

use sha2::{Digest, Sha256};

use super::types::ResolvedSet;

/// Compute the deterministic identifier for a platform and resolved set.
pub fn compute_id(platform: &str, resolved: &ResolvedSet) -> String {
  let mut hasher = Sha256::new();
  write_field(&mut hasher, platform);

  for (name, module) in resolved.iter() {
    write_field(&mut hasher, name);
    write_field(&mut hasher, &module.version);
  }

  hex::encode(hasher.finalize())
}

fn write_field(hasher: &mut Sha256, field: &str) {
  hasher.update(field.len().to_string().as_bytes());
  hasher.update(b":");
  hasher.update(field.as_bytes());
}
