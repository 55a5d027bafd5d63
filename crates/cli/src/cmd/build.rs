//! Implementation of the `binforge build` command.
//!
//! Resolves the requested dependencies, then fetches the matching artifact
//! from the store or builds it.

use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};

use binforge_lib::api::{BuildRequest, handle_build};

use super::{BuilderArgs, parse_dependencies};
use crate::output::{OutputFormat, exit_code, print_error, print_json, print_stat, print_success, truncate_hash};

pub fn cmd_build(
  args: &BuilderArgs,
  platform: &str,
  base: &str,
  dependencies: &[String],
  output: OutputFormat,
) -> Result<ExitCode> {
  let start = Instant::now();
  let request = BuildRequest {
    platform: platform.to_string(),
    base_constraint: base.to_string(),
    dependencies: parse_dependencies(dependencies)?,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(async {
    let builder = args.builder().await?;
    anyhow::Ok(handle_build(&builder, &request).await)
  })?;

  let code = exit_code(&outcome);
  let response = outcome.into_body();

  if output.is_json() {
    print_json(&response)?;
    return Ok(code);
  }

  match (response.artifact, response.error) {
    (Some(artifact), _) => {
      print_success("Artifact ready");
      print_stat("Id", truncate_hash(&artifact.id));
      print_stat("Platform", &artifact.platform);
      print_stat("Checksum", &artifact.checksum);
      print_stat("Url", &artifact.url);
      for (name, version) in &artifact.dependencies {
        print_stat(name, version);
      }
      print_stat("Duration", &humantime::format_duration(start.elapsed()).to_string());
    }
    (None, Some(error)) => print_error(&format!("{}: {}", error.kind, error.message)),
    (None, None) => print_error("build returned neither an artifact nor an error"),
  }

  Ok(code)
}
