//! Target platform identification.
//!
//! A platform is written `<os>/<arch>` (e.g. `linux/amd64`), matching the
//! `GOOS`/`GOARCH` pair handed to the foundry toolchain.

pub mod arch;
pub mod os;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use arch::Arch;
pub use os::Os;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
  #[error("invalid platform '{0}': expected <os>/<arch>")]
  Malformed(String),

  #[error("unsupported operating system '{0}'")]
  UnknownOs(String),

  #[error("unsupported architecture '{0}'")]
  UnknownArch(String),
}

/// Platform identifier combining OS and architecture (e.g., "linux/amd64")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
}

impl Platform {
  pub fn new(os: Os, arch: Arch) -> Self {
    Self { os, arch }
  }

  /// Detect the host platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      os: Os::current()?,
      arch: Arch::current()?,
    })
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.os, self.arch)
  }
}

impl FromStr for Platform {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let Some((os, arch)) = s.split_once('/') else {
      return Err(PlatformError::Malformed(s.to_string()));
    };
    if arch.contains('/') {
      return Err(PlatformError::Malformed(s.to_string()));
    }

    Ok(Self {
      os: os.parse()?,
      arch: arch.parse()?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_os_arch_pairs() {
    let platform: Platform = "linux/amd64".parse().unwrap();
    assert_eq!(platform, Platform::new(Os::Linux, Arch::Amd64));

    let platform: Platform = "darwin/arm64".parse().unwrap();
    assert_eq!(platform, Platform::new(Os::Darwin, Arch::Arm64));
  }

  #[test]
  fn display_roundtrips_canonical_form() {
    let platform = Platform::new(Os::Windows, Arch::Amd64);
    assert_eq!(platform.to_string(), "windows/amd64");
    assert_eq!(platform.to_string().parse::<Platform>().unwrap(), platform);
  }

  #[test]
  fn rejects_malformed_strings() {
    assert!(matches!(
      "not-a-real-platform".parse::<Platform>(),
      Err(PlatformError::Malformed(_))
    ));
    assert!(matches!(
      "linux/amd64/v2".parse::<Platform>(),
      Err(PlatformError::Malformed(_))
    ));
    assert!(matches!("".parse::<Platform>(), Err(PlatformError::Malformed(_))));
  }

  #[test]
  fn rejects_unknown_components() {
    assert!(matches!(
      "linux/riscv64".parse::<Platform>(),
      Err(PlatformError::UnknownArch(_))
    ));
    assert!(matches!(
      "freebsd/amd64".parse::<Platform>(),
      Err(PlatformError::UnknownOs(_))
    ));
  }

  #[test]
  fn current_platform_is_supported() {
    assert!(Platform::current().is_some());
  }
}
