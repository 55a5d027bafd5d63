//! Foundry that shells out to an `xk6`-compatible build tool.
//!
//! The tool is invoked as
//!
//! ```text
//! <program> [base args...] build <version> --with <path>@<version>... --output <file>
//! ```
//!
//! with `GOOS`/`GOARCH` taken from the target platform. The output file lives
//! in a scratch directory that is removed once the binary has been read.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Foundry, FoundryError, FoundryRequest};
use crate::consts::{BASE_NAME, DEFAULT_FOUNDRY_BIN};
use crate::platform::Os;

/// Variables kept when the caller's environment is not copied.
const KEPT_ENV: &[&str] = &["PATH", "HOME"];

#[derive(Debug, Clone)]
pub struct CommandFoundry {
  program: PathBuf,
  base_args: Vec<OsString>,
}

impl Default for CommandFoundry {
  fn default() -> Self {
    Self::new(DEFAULT_FOUNDRY_BIN)
  }
}

impl CommandFoundry {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      base_args: Vec::new(),
    }
  }

  /// Arguments placed before `build`, e.g. `run go.k6.io/xk6/cmd/xk6@latest`
  /// when the program is `go`.
  pub fn with_base_args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.base_args = args.into_iter().map(Into::into).collect();
    self
  }

  fn command(&self, request: &FoundryRequest, output: &std::path::Path) -> Command {
    let mut command = Command::new(&self.program);
    command.args(&self.base_args).arg("build").arg(&request.version);
    for module in &request.modules {
      command.arg("--with").arg(format!("{}@{}", module.path, module.version));
    }
    command.arg("--output").arg(output);

    if !request.copy_env {
      command.env_clear();
      for key in KEPT_ENV {
        if let Some(value) = std::env::var_os(key) {
          command.env(key, value);
        }
      }
    }

    command
      .env("GOOS", request.platform.os.as_str())
      .env("GOARCH", request.platform.arch.as_str())
      .envs(&request.env)
      .stdin(Stdio::null())
      .kill_on_drop(true);

    command
  }
}

#[async_trait]
impl Foundry for CommandFoundry {
  async fn build(&self, request: &FoundryRequest) -> Result<Vec<u8>, FoundryError> {
    let scratch = tokio::task::spawn_blocking(TempDir::new)
      .await
      .map_err(std::io::Error::other)??;
    let file_name = match request.platform.os {
      Os::Windows => format!("{BASE_NAME}.exe"),
      _ => BASE_NAME.to_string(),
    };
    let output = scratch.path().join(file_name);

    let mut command = self.command(request, &output);
    info!(
      program = %self.program.display(),
      platform = %request.platform,
      version = %request.version,
      modules = request.modules.len(),
      "running build tool"
    );

    let spawn_err = |source| FoundryError::Spawn {
      program: self.program.display().to_string(),
      source,
    };

    let (status, stderr) = if request.verbose {
      command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
      let status = command.spawn().map_err(spawn_err)?.wait().await?;
      (status, String::new())
    } else {
      command.stdout(Stdio::piped()).stderr(Stdio::piped());
      let out = command.spawn().map_err(spawn_err)?.wait_with_output().await?;
      let stdout = String::from_utf8_lossy(&out.stdout);
      if !stdout.trim().is_empty() {
        debug!(stdout = %stdout.trim(), "build tool stdout");
      }
      (out.status, String::from_utf8_lossy(&out.stderr).trim().to_string())
    };

    if !status.success() {
      return Err(FoundryError::Failed {
        code: status.code(),
        stderr,
      });
    }

    match tokio::fs::read(&output).await {
      Ok(content) => {
        debug!(bytes = content.len(), "build tool finished");
        Ok(content)
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        Err(FoundryError::MissingOutput(output.display().to_string()))
      }
      Err(e) => Err(e.into()),
    }
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::build::Module;
  use crate::platform::Platform;
  use std::collections::BTreeMap;
  use std::path::Path;

  /// Fake build tool: records its version argument, platform, modules and
  /// `CGO_ENABLED` into the output file.
  const FAKE_TOOL: &str = r#"
version="$2"
shift 2
mods=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --with) mods="$mods $2"; shift 2 ;;
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf '%s %s/%s%s cgo=%s' "$version" "$GOOS" "$GOARCH" "$mods" "$CGO_ENABLED" > "$out"
"#;

  // The script is run through /bin/sh so the test never execs a file it just wrote.
  fn foundry(dir: &Path, script: &str) -> CommandFoundry {
    let path = dir.join("tool.sh");
    std::fs::write(&path, script).unwrap();
    CommandFoundry::new("/bin/sh").with_base_args([path])
  }

  fn request(env: &[(&str, &str)]) -> FoundryRequest {
    FoundryRequest {
      platform: "linux/arm64".parse::<Platform>().unwrap(),
      version: "v0.50.0".to_string(),
      modules: vec![Module {
        path: "github.com/grafana/xk6-kafka".to_string(),
        version: "v0.2.0".to_string(),
        requires_native: false,
      }],
      env: env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>(),
      copy_env: true,
      verbose: false,
    }
  }

  #[tokio::test]
  async fn passes_platform_version_and_modules() {
    let temp = TempDir::new().unwrap();
    let foundry = foundry(temp.path(), FAKE_TOOL);

    let content = foundry.build(&request(&[("CGO_ENABLED", "0")])).await.unwrap();

    assert_eq!(
      String::from_utf8(content).unwrap(),
      "v0.50.0 linux/arm64 github.com/grafana/xk6-kafka@v0.2.0 cgo=0"
    );
  }

  #[tokio::test]
  async fn minimal_environment_still_gets_build_variables() {
    let temp = TempDir::new().unwrap();
    let foundry = foundry(temp.path(), FAKE_TOOL);
    let mut req = request(&[("CGO_ENABLED", "1")]);
    req.copy_env = false;

    let content = foundry.build(&req).await.unwrap();
    assert!(String::from_utf8(content).unwrap().ends_with("cgo=1"));
  }

  #[tokio::test]
  async fn nonzero_exit_is_failure_with_stderr() {
    let temp = TempDir::new().unwrap();
    let foundry = foundry(temp.path(), "echo 'no such module' >&2\nexit 3\n");

    let err = foundry.build(&request(&[])).await.unwrap_err();
    match err {
      FoundryError::Failed { code, stderr } => {
        assert_eq!(code, Some(3));
        assert_eq!(stderr, "no such module");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn success_without_output_file_is_error() {
    let temp = TempDir::new().unwrap();
    let foundry = foundry(temp.path(), "exit 0\n");

    assert!(matches!(
      foundry.build(&request(&[])).await,
      Err(FoundryError::MissingOutput(_))
    ));
  }

  #[tokio::test]
  async fn missing_program_is_spawn_error() {
    let foundry = CommandFoundry::new("/nonexistent/xk6");

    assert!(matches!(
      foundry.build(&request(&[])).await,
      Err(FoundryError::Spawn { .. })
    ));
  }
}
