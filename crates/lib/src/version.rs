//! Version range matching.
//!
//! Constraints are written the way dependency catalogs express them:
//! `v`-prefixed versions, comparison operators, comma- or space-separated
//! conjunctions and `||` disjunctions. A bare version is an exact match.
//!
//! ```ignore
//! let c = Constraint::parse(">=v0.8.0, <v1.0.0 || v2.0.0")?;
//! assert!(c.matches(&parse_version("v0.9.1")?));
//! ```

use std::fmt;

use semver::{Comparator, Version, VersionReq};
use thiserror::Error;

const OPERATORS: &[&str] = &["!=", ">=", "<=", "=", ">", "<", "~", "^"];

#[derive(Debug, Error)]
pub enum ConstraintError {
  #[error("invalid version '{input}': {source}")]
  InvalidVersion {
    input: String,
    #[source]
    source: semver::Error,
  },

  #[error("operator '{0}' is not followed by a version")]
  MissingVersion(String),

  #[error("empty alternative in constraint '{0}'")]
  EmptyAlternative(String),
}

/// One `||`-separated alternative: every comparator must hold and no excluded
/// version may be matched.
#[derive(Debug, Clone)]
struct Group {
  req: VersionReq,
  excluded: Vec<Version>,
}

impl Group {
  fn matches(&self, version: &Version) -> bool {
    self.req.matches(version) && !self.excluded.contains(version)
  }
}

/// A parsed version-range expression.
#[derive(Debug, Clone)]
pub struct Constraint {
  source: String,
  groups: Vec<Group>,
}

impl Constraint {
  pub fn parse(expr: &str) -> Result<Self, ConstraintError> {
    let trimmed = expr.trim();

    let groups = if trimmed.is_empty() {
      vec![Group {
        req: VersionReq::STAR,
        excluded: Vec::new(),
      }]
    } else {
      trimmed
        .split("||")
        .map(|alt| parse_group(alt, trimmed))
        .collect::<Result<Vec<_>, _>>()?
    };

    Ok(Self {
      source: trimmed.to_string(),
      groups,
    })
  }

  /// Returns true if `version` satisfies any alternative.
  ///
  /// Pre-release versions only match comparators that name a pre-release of
  /// the same `major.minor.patch`.
  pub fn matches(&self, version: &Version) -> bool {
    self.groups.iter().any(|g| g.matches(version))
  }

  pub fn as_str(&self) -> &str {
    &self.source
  }
}

impl fmt::Display for Constraint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.source)
  }
}

/// Parse a semantic version, accepting a leading `v` or `V`.
pub fn parse_version(input: &str) -> Result<Version, ConstraintError> {
  let trimmed = input.trim();
  Version::parse(strip_v(trimmed)).map_err(|source| ConstraintError::InvalidVersion {
    input: trimmed.to_string(),
    source,
  })
}

/// Splits a leading comparison operator off `term`, returning `("", term)` when
/// there is none.
pub(crate) fn split_operator(term: &str) -> (&str, &str) {
  for op in OPERATORS {
    if let Some(rest) = term.strip_prefix(op) {
      return (op, rest.trim_start());
    }
  }
  ("", term)
}

fn strip_v(version: &str) -> &str {
  version
    .strip_prefix('v')
    .or_else(|| version.strip_prefix('V'))
    .unwrap_or(version)
}

fn parse_group(alt: &str, whole: &str) -> Result<Group, ConstraintError> {
  let mut comparators = Vec::new();
  let mut excluded = Vec::new();
  let mut pending_op: Option<&str> = None;
  let mut seen_term = false;

  for token in alt.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty()) {
    if OPERATORS.contains(&token) {
      if let Some(op) = pending_op {
        return Err(ConstraintError::MissingVersion(op.to_string()));
      }
      pending_op = Some(token);
      continue;
    }

    let term = match pending_op.take() {
      Some(op) => format!("{op}{token}"),
      None => token.to_string(),
    };
    seen_term = true;

    let (op, version) = split_operator(&term);
    if version.is_empty() {
      return Err(ConstraintError::MissingVersion(op.to_string()));
    }

    if op == "!=" {
      excluded.push(parse_version(version)?);
      continue;
    }

    if op.is_empty() && matches!(version, "*" | "x" | "X") {
      continue;
    }

    // A bare version pins exactly, unlike semver's default caret semantics.
    let op = if op.is_empty() { "=" } else { op };
    let normalized = format!("{op}{}", strip_v(version));
    let comparator = Comparator::parse(&normalized).map_err(|source| ConstraintError::InvalidVersion {
      input: term.clone(),
      source,
    })?;
    comparators.push(comparator);
  }

  if let Some(op) = pending_op {
    return Err(ConstraintError::MissingVersion(op.to_string()));
  }
  if !seen_term {
    return Err(ConstraintError::EmptyAlternative(whole.to_string()));
  }

  Ok(Group {
    req: VersionReq { comparators },
    excluded,
  })
}
