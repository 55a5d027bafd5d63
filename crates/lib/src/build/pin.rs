//! Build-metadata escape for the base program.
//!
//! A base constraint of the form `v0.0.0+<token>` names an unreleased build
//! (e.g. a source snapshot) instead of a catalog release. It bypasses catalog
//! resolution and is carried through as the pseudo-version `v0.0.0+<token>`;
//! the foundry is handed `<token>` alone.

use semver::Version;
use thiserror::Error;

use crate::consts::PINNED_BASE_VERSION;
use crate::version::split_operator;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
  #[error("only exact match is allowed for versions with build metadata, found '{0}'")]
  NonExactOperator(String),

  #[error("version with build metadata must be {PINNED_BASE_VERSION}, found '{0}'")]
  WrongBase(String),

  #[error("malformed version with build metadata '{0}'")]
  Malformed(String),
}

/// How the base program's version is determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseVersion {
  /// Resolve the constraint against the catalog.
  Catalog(String),
  /// Use the build token verbatim, skipping the catalog.
  Pinned(String),
}

impl BaseVersion {
  /// Classify a base-program constraint.
  ///
  /// Any constraint carrying `+` build metadata must be exactly
  /// `[=]v0.0.0+<token>`; anything else with build metadata is rejected.
  pub fn classify(constraint: &str) -> Result<Self, PinError> {
    let trimmed = constraint.trim();
    if !trimmed.contains('+') {
      return Ok(Self::Catalog(trimmed.to_string()));
    }

    if trimmed.contains("||") || trimmed.contains(',') {
      return Err(PinError::Malformed(trimmed.to_string()));
    }

    let (op, version) = split_operator(trimmed);
    if version.contains(char::is_whitespace) {
      return Err(PinError::Malformed(trimmed.to_string()));
    }
    if !op.is_empty() && op != "=" {
      return Err(PinError::NonExactOperator(trimmed.to_string()));
    }

    let bare = version
      .strip_prefix('v')
      .or_else(|| version.strip_prefix('V'))
      .unwrap_or(version);
    let parsed = Version::parse(bare).map_err(|_| PinError::Malformed(trimmed.to_string()))?;

    if parsed.major != 0 || parsed.minor != 0 || parsed.patch != 0 || !parsed.pre.is_empty() {
      return Err(PinError::WrongBase(trimmed.to_string()));
    }

    Ok(Self::Pinned(parsed.build.as_str().to_string()))
  }

  /// The pseudo-version recorded for a pinned build.
  pub fn pinned_version(token: &str) -> String {
    format!("{PINNED_BASE_VERSION}+{token}")
  }
}

/// The version string handed to the foundry: the build token for a pinned
/// pseudo-version, the version itself otherwise.
pub fn foundry_version(version: &str) -> &str {
  match version.split_once('+') {
    Some((_, token)) => token,
    None => version,
  }
}
