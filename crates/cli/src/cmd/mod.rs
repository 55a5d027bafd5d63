mod build;
mod resolve;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args};
use tracing::debug;

use binforge_lib::build::{Builder, BuilderConfig, BuilderOpts, Dependency};
use binforge_lib::catalog::Registry;
use binforge_lib::consts::{APP_NAME, DEFAULT_FOUNDRY_BIN};
use binforge_lib::foundry::CommandFoundry;
use binforge_lib::store::FileStore;

pub use build::cmd_build;
pub use resolve::cmd_resolve;

/// Options shared by every command that drives a builder.
#[derive(Debug, Args)]
pub struct BuilderArgs {
  /// Catalog location: a JSON file or an http(s) URL
  #[arg(short, long, global = true, default_value = "catalog.json")]
  catalog: String,

  /// Directory of the object store [default: <tmp>/binforge/store]
  #[arg(long, global = true)]
  store_dir: Option<PathBuf>,

  /// Build tool invoked to produce binaries
  #[arg(long, global = true, default_value = DEFAULT_FOUNDRY_BIN)]
  foundry_bin: PathBuf,

  /// Build environment variable as KEY=VALUE (repeatable)
  #[arg(short, long = "env", global = true, value_parser = parse_env)]
  env: Vec<(String, String)>,

  /// Inherit the current environment when building
  #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
  copy_env: bool,

  /// Always build with native code linkage
  #[arg(long, global = true)]
  enable_native: bool,

  /// Accept v0.0.0+<build> as base version
  #[arg(long, global = true)]
  allow_build_semvers: bool,

  /// Show build tool output
  #[arg(short, long, global = true)]
  verbose: bool,
}

impl BuilderArgs {
  fn opts(&self) -> BuilderOpts {
    BuilderOpts {
      allow_build_semvers: self.allow_build_semvers,
      verbose: self.verbose,
      env: self.env.iter().cloned().collect(),
      copy_env: self.copy_env,
      enable_native: self.enable_native,
    }
  }

  fn store_dir(&self) -> PathBuf {
    self
      .store_dir
      .clone()
      .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME).join("store"))
  }

  async fn builder(&self) -> Result<Builder> {
    let catalog = Registry::load(&self.catalog)
      .await
      .with_context(|| format!("Failed to load catalog from {}", self.catalog))?;

    let store_dir = self.store_dir();
    debug!(store = %store_dir.display(), modules = catalog.len(), "creating builder");

    let config = BuilderConfig::new(
      Arc::new(catalog),
      Arc::new(FileStore::new(store_dir)),
      Arc::new(CommandFoundry::new(&self.foundry_bin)),
    )
    .with_opts(self.opts());

    Builder::new(config).context("Invalid builder options")
  }
}

fn parse_env(s: &str) -> Result<(String, String)> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => bail!("expected KEY=VALUE, got '{s}'"),
  }
}

/// Parse `<name>[:<constraint>]`; a missing constraint means any version.
pub fn parse_dependencies(specs: &[String]) -> Result<Vec<Dependency>> {
  specs
    .iter()
    .map(|arg| {
      let (name, constraints) = arg.split_once(':').unwrap_or((arg.as_str(), "*"));
      if name.trim().is_empty() {
        bail!("dependency '{arg}' has no name");
      }
      Ok(Dependency::new(name.trim(), constraints.trim()))
    })
    .collect()
}
