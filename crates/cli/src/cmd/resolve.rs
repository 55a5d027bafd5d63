use std::process::ExitCode;

use anyhow::{Context, Result};

use binforge_lib::api::{ResolveRequest, handle_resolve};

use super::{BuilderArgs, parse_dependencies};
use crate::output::{OutputFormat, exit_code, print_error, print_json, print_stat};

pub fn cmd_resolve(args: &BuilderArgs, base: &str, dependencies: &[String], output: OutputFormat) -> Result<ExitCode> {
  let request = ResolveRequest {
    base_constraint: base.to_string(),
    dependencies: parse_dependencies(dependencies)?,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(async {
    let builder = args.builder().await?;
    anyhow::Ok(handle_resolve(&builder, &request).await)
  })?;

  let code = exit_code(&outcome);
  let response = outcome.into_body();

  if output.is_json() {
    print_json(&response)?;
    return Ok(code);
  }

  if let Some(versions) = response.versions {
    for (name, version) in &versions {
      print_stat(name, version);
    }
  } else if let Some(error) = response.error {
    print_error(&format!("{}: {}", error.kind, error.message));
  }

  Ok(code)
}
