mod cmd;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuilderArgs, cmd_build, cmd_resolve};
use output::{OutputFormat, print_error};

/// binforge - build and cache extended binaries
#[derive(Parser)]
#[command(name = "binforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Log level when RUST_LOG is not set
  #[arg(short = 'l', long, global = true, default_value = "info")]
  log_level: String,

  /// Print results as JSON
  #[arg(long, global = true)]
  json: bool,

  #[command(flatten)]
  builder: BuilderArgs,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build an artifact, or fetch it from the store if already built
  Build {
    /// Target platform as <os>/<arch>
    #[arg(short, long)]
    platform: String,

    /// Version constraint for the base program
    #[arg(short = 'k', long = "k6", default_value = "*")]
    base: String,

    /// Dependency as <name>[:<constraint>] (repeatable)
    #[arg(short, long = "dependency")]
    dependencies: Vec<String>,
  },

  /// Show the versions a build would use without building
  Resolve {
    /// Version constraint for the base program
    #[arg(short = 'k', long = "k6", default_value = "*")]
    base: String,

    /// Dependency as <name>[:<constraint>] (repeatable)
    #[arg(short, long = "dependency")]
    dependencies: Vec<String>,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let output = if cli.json {
    OutputFormat::Json
  } else {
    OutputFormat::Text
  };

  let result = match cli.command {
    Commands::Build {
      platform,
      base,
      dependencies,
    } => cmd_build(&cli.builder, &platform, &base, &dependencies, output),
    Commands::Resolve { base, dependencies } => cmd_resolve(&cli.builder, &base, &dependencies, output),
  };

  match result {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}
