//! Artifact builds.
//!
//! A build request names a target platform, a version constraint for the base
//! program and a list of extension dependencies. The [`Builder`] resolves the
//! request to concrete module versions, derives a content id from them, and
//! returns the artifact stored under that id, producing it first if needed.
//!
//! # Characteristics
//!
//! - **Deterministic**: identical resolved inputs always map to the same id
//! - **Cached**: an artifact is built once and served from the store afterwards
//! - **Deduplicated**: concurrent requests for one id share a single build
//!
//! # Submodules
//!
//! - [`builder`] - Request orchestration and the error taxonomy
//! - [`id`] - Artifact id derivation
//! - [`lock`] - Per-artifact mutual exclusion
//! - [`metrics`] - Builder counters and timers
//! - [`pin`] - Build-metadata pinning of the base program

pub mod builder;
pub mod id;
pub mod lock;
pub mod metrics;
pub mod pin;
mod types;

pub use builder::{BuildError, Builder, BuilderConfig, BuilderOpts, ErrorKind, InitError, RequestProblem};
pub use types::*;
