//! Request/response surface for fronting the builder with a service.
//!
//! Handlers never fail: every outcome, including errors, is a response body.
//! [`Outcome`] tells a transport whether the body carries a result, a problem
//! with the caller's request, or a fault of the build system itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::build::{Artifact, BuildError, Builder, Dependency, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
  pub platform: String,
  #[serde(rename = "k6", alias = "base", default)]
  pub base_constraint: String,
  #[serde(default)]
  pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildResponse {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artifact: Option<Artifact>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
  #[serde(rename = "k6", alias = "base", default)]
  pub base_constraint: String,
  #[serde(default)]
  pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolveResponse {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub versions: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
  pub kind: ErrorKind,
  pub message: String,
}

impl From<&BuildError> for ErrorBody {
  fn from(err: &BuildError) -> Self {
    Self {
      kind: err.kind(),
      message: err.to_string(),
    }
  }
}

/// A response plus how the transport should treat it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
  /// The request succeeded; the body carries the result.
  Ok(T),
  /// The request cannot be satisfied; the body carries the reason.
  Rejected(T),
  /// The build system failed; the body carries the error.
  Fault(T),
}

impl<T> Outcome<T> {
  pub fn body(&self) -> &T {
    match self {
      Outcome::Ok(body) | Outcome::Rejected(body) | Outcome::Fault(body) => body,
    }
  }

  pub fn into_body(self) -> T {
    match self {
      Outcome::Ok(body) | Outcome::Rejected(body) | Outcome::Fault(body) => body,
    }
  }

  /// Whether the transport itself should report success.
  pub fn is_structural_success(&self) -> bool {
    !matches!(self, Outcome::Fault(_))
  }

  fn from_error(err: &BuildError, body: T) -> Self {
    if err.is_retryable() {
      warn!(kind = %err.kind(), error = %err, "request failed");
      Outcome::Fault(body)
    } else {
      Outcome::Rejected(body)
    }
  }
}

pub async fn handle_build(builder: &Builder, request: &BuildRequest) -> Outcome<BuildResponse> {
  match builder
    .build(&request.platform, &request.base_constraint, &request.dependencies)
    .await
  {
    Ok(artifact) => Outcome::Ok(BuildResponse {
      artifact: Some(artifact),
      error: None,
    }),
    Err(e) => Outcome::from_error(
      &e,
      BuildResponse {
        artifact: None,
        error: Some(ErrorBody::from(&e)),
      },
    ),
  }
}

pub async fn handle_resolve(builder: &Builder, request: &ResolveRequest) -> Outcome<ResolveResponse> {
  match builder.resolve(&request.base_constraint, &request.dependencies).await {
    Ok(versions) => Outcome::Ok(ResolveResponse {
      versions: Some(versions),
      error: None,
    }),
    Err(e) => Outcome::from_error(
      &e,
      ResolveResponse {
        versions: None,
        error: Some(ErrorBody::from(&e)),
      },
    ),
  }
}
