//! CLI output formatting utilities.
//!
//! Colored status lines on the terminal, plain JSON when asked for.

use std::process::ExitCode;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use binforge_lib::api::Outcome;

#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
}

/// Exit status for an outcome: caller errors are told apart from faults.
pub fn exit_status<T>(outcome: &Outcome<T>) -> u8 {
  match outcome {
    Outcome::Ok(_) => 0,
    Outcome::Rejected(_) => 2,
    Outcome::Fault(_) => 1,
  }
}

pub fn exit_code<T>(outcome: &Outcome<T>) -> ExitCode {
  ExitCode::from(exit_status(outcome))
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
