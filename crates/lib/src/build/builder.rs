//! Build orchestration.
//!
//! [`Builder`] ties the collaborators together: it validates a request,
//! resolves every dependency through the catalog, derives the artifact id,
//! serializes in-flight builds of that id, and serves the artifact from the
//! object store or produces it with the foundry.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::id::compute_id;
use super::lock::ArtifactLocks;
use super::metrics::BuildMetrics;
use super::pin::{BaseVersion, PinError, foundry_version};
use super::types::{Artifact, Dependency, Module, ResolvedSet};
use crate::catalog::{Catalog, CatalogError};
use crate::consts::{BASE_NAME, BASE_PATH, NATIVE_LINKAGE_ENV};
use crate::foundry::{Foundry, FoundryError, FoundryRequest};
use crate::platform::{Platform, PlatformError};
use crate::store::{Object, ObjectStore, StoreError};

/// Variables the builder sets per build; they cannot be overridden.
const RESERVED_ENV: &[&str] = &["GOOS", "GOARCH"];

/// Builder policy and foundry environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderOpts {
  /// Accept `v0.0.0+<token>` as the base version.
  pub allow_build_semvers: bool,
  /// Forward foundry output.
  pub verbose: bool,
  /// Extra variables for the foundry environment.
  pub env: BTreeMap<String, String>,
  /// Inherit the caller's environment when building.
  pub copy_env: bool,
  /// Build with native linkage even if no module requires it.
  pub enable_native: bool,
}

impl Default for BuilderOpts {
  fn default() -> Self {
    Self {
      allow_build_semvers: false,
      verbose: false,
      env: BTreeMap::new(),
      copy_env: true,
      enable_native: false,
    }
  }
}

pub struct BuilderConfig {
  pub opts: BuilderOpts,
  pub catalog: Arc<dyn Catalog>,
  pub store: Arc<dyn ObjectStore>,
  pub foundry: Arc<dyn Foundry>,
  /// Where the builder's metrics are registered. Metrics are discarded if
  /// unset, so a long-running embedder that exports metrics must supply its
  /// own recorder here. The `binforge` CLI runs one request and leaves it unset.
  pub recorder: Option<Arc<dyn metrics::Recorder + Send + Sync>>,
}

impl BuilderConfig {
  pub fn new(catalog: Arc<dyn Catalog>, store: Arc<dyn ObjectStore>, foundry: Arc<dyn Foundry>) -> Self {
    Self {
      opts: BuilderOpts::default(),
      catalog,
      store,
      foundry,
      recorder: None,
    }
  }

  pub fn with_opts(mut self, opts: BuilderOpts) -> Self {
    self.opts = opts;
    self
  }

  pub fn with_recorder(mut self, recorder: Arc<dyn metrics::Recorder + Send + Sync>) -> Self {
    self.recorder = Some(recorder);
    self
  }
}

#[derive(Debug, Error)]
pub enum InitError {
  #[error("invalid environment variable name '{0}'")]
  InvalidEnvName(String),

  #[error("environment variable '{0}' is set by the builder and cannot be overridden")]
  ReservedEnv(String),
}

/// Why a request was rejected as invalid.
#[derive(Debug, Error)]
pub enum RequestProblem {
  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error("resolving '{name}': {source}")]
  Unresolvable {
    name: String,
    #[source]
    source: CatalogError,
  },

  #[error("dependency name '{0}' is reserved for the base program")]
  ReservedName(String),

  #[error("dependency '{0}' is listed more than once")]
  DuplicateDependency(String),

  #[error("build metadata in base version '{0}' is not allowed")]
  BuildSemverNotAllowed(String),

  #[error(transparent)]
  BuildSemver(#[from] PinError),
}

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("invalid parameters: {0}")]
  InvalidParameters(#[source] RequestProblem),

  #[error("accessing artifact: {0}")]
  ArtifactAccessFailed(#[source] StoreError),

  #[error("build failed: {0}")]
  BuildFailed(#[source] FoundryError),
}

/// Coarse error classification, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  InvalidParameters,
  ArtifactAccessFailed,
  BuildFailed,
}

impl ErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorKind::InvalidParameters => "invalid_parameters",
      ErrorKind::ArtifactAccessFailed => "artifact_access_failed",
      ErrorKind::BuildFailed => "build_failed",
    }
  }
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl BuildError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      BuildError::InvalidParameters(_) => ErrorKind::InvalidParameters,
      BuildError::ArtifactAccessFailed(_) => ErrorKind::ArtifactAccessFailed,
      BuildError::BuildFailed(_) => ErrorKind::BuildFailed,
    }
  }

  /// Invalid requests fail the same way every time; anything else may succeed
  /// on a later attempt.
  pub fn is_retryable(&self) -> bool {
    !matches!(self, BuildError::InvalidParameters(_))
  }
}

impl From<RequestProblem> for BuildError {
  fn from(problem: RequestProblem) -> Self {
    BuildError::InvalidParameters(problem)
  }
}

pub struct Builder {
  opts: BuilderOpts,
  catalog: Arc<dyn Catalog>,
  store: Arc<dyn ObjectStore>,
  foundry: Arc<dyn Foundry>,
  locks: ArtifactLocks,
  metrics: BuildMetrics,
}

impl Builder {
  pub fn new(config: BuilderConfig) -> Result<Self, InitError> {
    for key in config.opts.env.keys() {
      if key.is_empty() || key.contains(['=', '\0']) {
        return Err(InitError::InvalidEnvName(key.clone()));
      }
      if RESERVED_ENV.contains(&key.as_str()) {
        return Err(InitError::ReservedEnv(key.clone()));
      }
    }

    let metrics = match &config.recorder {
      Some(recorder) => BuildMetrics::register(recorder.as_ref()),
      None => BuildMetrics::noop(),
    };

    Ok(Self {
      opts: config.opts,
      catalog: config.catalog,
      store: config.store,
      foundry: config.foundry,
      locks: ArtifactLocks::new(),
      metrics,
    })
  }

  pub fn opts(&self) -> &BuilderOpts {
    &self.opts
  }

  /// Return the artifact for `platform`, the base program at `base` and
  /// `dependencies`, building it if the store does not have it yet.
  pub async fn build(&self, platform: &str, base: &str, dependencies: &[Dependency]) -> Result<Artifact, BuildError> {
    self.metrics.requests.increment(1);
    let started = Instant::now();
    debug!(platform, base, dependencies = dependencies.len(), "build requested");

    let target: Platform = match platform.parse() {
      Ok(target) => target,
      Err(e) => {
        self.metrics.invalid.increment(1);
        return Err(RequestProblem::Platform(e).into());
      }
    };

    let resolved = match self.resolve_set(base, dependencies).await {
      Ok(resolved) => resolved,
      Err(e) => {
        self.metrics.invalid.increment(1);
        return Err(e);
      }
    };

    let id = compute_id(platform, &resolved);
    let _lock = self.locks.acquire(&id).await;

    let object = match self.store.get(&id).await {
      Ok(object) => {
        self.metrics.store_hits.increment(1);
        info!(id = %id, platform, "artifact served from store");
        object
      }
      Err(e) if e.is_not_found() => {
        let content = self.run_foundry(target, &resolved).await?;
        self.store_artifact(&id, content).await?
      }
      Err(e) => return Err(BuildError::ArtifactAccessFailed(e)),
    };

    self.metrics.request_duration.record(started.elapsed());

    Ok(Artifact {
      id,
      checksum: object.checksum,
      url: object.url,
      dependencies: resolved.versions(),
      platform: platform.to_string(),
    })
  }

  /// The name to version mapping a build with the same inputs would use.
  /// Touches neither the store nor the foundry.
  pub async fn resolve(&self, base: &str, dependencies: &[Dependency]) -> Result<BTreeMap<String, String>, BuildError> {
    Ok(self.resolve_set(base, dependencies).await?.versions())
  }

  async fn resolve_set(&self, base: &str, dependencies: &[Dependency]) -> Result<ResolvedSet, BuildError> {
    let mut seen = HashSet::new();
    for dep in dependencies {
      if dep.name == BASE_NAME {
        return Err(RequestProblem::ReservedName(dep.name.clone()).into());
      }
      if !seen.insert(dep.name.as_str()) {
        return Err(RequestProblem::DuplicateDependency(dep.name.clone()).into());
      }
    }

    let base_module = match BaseVersion::classify(base).map_err(RequestProblem::from)? {
      BaseVersion::Pinned(token) => {
        if !self.opts.allow_build_semvers {
          return Err(RequestProblem::BuildSemverNotAllowed(base.to_string()).into());
        }
        Module {
          path: BASE_PATH.to_string(),
          version: BaseVersion::pinned_version(&token),
          requires_native: false,
        }
      }
      BaseVersion::Catalog(constraints) => self.resolve_one(&Dependency::new(BASE_NAME, constraints)).await?,
    };

    let mut resolved = ResolvedSet::new(base_module);
    for dep in dependencies {
      let module = self.resolve_one(dep).await?;
      resolved.insert(dep.name.clone(), module);
    }

    debug!(versions = ?resolved.versions(), "dependencies resolved");
    Ok(resolved)
  }

  async fn resolve_one(&self, dependency: &Dependency) -> Result<Module, BuildError> {
    self.catalog.resolve(dependency).await.map_err(|source| {
      RequestProblem::Unresolvable {
        name: dependency.name.clone(),
        source,
      }
      .into()
    })
  }

  async fn run_foundry(&self, platform: Platform, resolved: &ResolvedSet) -> Result<Vec<u8>, BuildError> {
    let native = self.opts.enable_native || resolved.requires_native();
    let mut env = self.opts.env.clone();
    if native {
      env.insert(NATIVE_LINKAGE_ENV.to_string(), "1".to_string());
    } else {
      // A value from the options wins unless a module forces linkage on.
      env.entry(NATIVE_LINKAGE_ENV.to_string()).or_insert_with(|| "0".to_string());
    }

    let request = FoundryRequest {
      platform,
      version: foundry_version(&resolved.base().version).to_string(),
      modules: resolved.dependencies().map(|(_, module)| module.clone()).collect(),
      env,
      copy_env: self.opts.copy_env,
      verbose: self.opts.verbose,
    };

    self.metrics.builds.increment(1);
    let started = Instant::now();
    info!(platform = %platform, version = %request.version, native, "building artifact");

    match self.foundry.build(&request).await {
      Ok(content) => {
        let elapsed = started.elapsed();
        self.metrics.build_duration.record(elapsed);
        info!(bytes = content.len(), elapsed = ?elapsed, "artifact built");
        Ok(content)
      }
      Err(e) => {
        self.metrics.builds_failed.increment(1);
        warn!(platform = %platform, error = %e, "build failed");
        Err(BuildError::BuildFailed(e))
      }
    }
  }

  async fn store_artifact(&self, id: &str, content: Vec<u8>) -> Result<Object, BuildError> {
    match self.store.put(id, content).await {
      Ok(object) => Ok(object),
      Err(e) if e.is_duplicate() => {
        warn!(id, "artifact stored concurrently, reading it back");
        self.store.get(id).await.map_err(BuildError::ArtifactAccessFailed)
      }
      Err(e) => Err(BuildError::ArtifactAccessFailed(e)),
    }
  }
}
