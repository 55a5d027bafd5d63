//! Producing artifact binaries.
//!
//! A [`Foundry`] turns a resolved set of modules into binary content for a
//! target platform. The builder treats it as an opaque, possibly slow
//! operation: it runs at most once per artifact id at a time, and its output
//! is handed straight to the object store.
//!
//! # Submodules
//!
//! - [`cmd`] - Foundry backed by an external build tool

pub mod cmd;

use std::collections::BTreeMap;
use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::build::Module;
use crate::platform::Platform;

pub use cmd::CommandFoundry;

/// Everything a foundry needs to produce one binary.
#[derive(Debug, Clone)]
pub struct FoundryRequest {
  pub platform: Platform,
  /// Base version as understood by the build tool.
  pub version: String,
  /// Extension modules to link in, base excluded.
  pub modules: Vec<Module>,
  /// Variables set for the build, applied after the inherited environment.
  pub env: BTreeMap<String, String>,
  /// Inherit the caller's environment. When false only `PATH` and `HOME` are kept.
  pub copy_env: bool,
  /// Forward build tool output instead of capturing it.
  pub verbose: bool,
}

#[derive(Debug, Error)]
pub enum FoundryError {
  #[error("failed to start '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("build tool exited with {}: {stderr}", exit_label(.code))]
  Failed { code: Option<i32>, stderr: String },

  #[error("build tool produced no output at {0}")]
  MissingOutput(String),

  #[error("foundry io error: {0}")]
  Io(#[from] io::Error),

  #[error("{0}")]
  Other(String),
}

fn exit_label(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("code {code}"),
    None => "signal".to_string(),
  }
}

#[async_trait]
pub trait Foundry: Send + Sync {
  /// Build a binary. Dropping the returned future abandons the build.
  async fn build(&self, request: &FoundryRequest) -> Result<Vec<u8>, FoundryError>;
}
