//! binforge-lib: build and cache engine for extended binaries
//!
//! This crate assembles binaries from a base program plus version-constrained
//! extension modules and caches them by content id:
//! - `Builder`: resolves a request, deduplicates concurrent builds, serves or produces the artifact
//! - `Catalog`: maps dependency constraints to concrete modules
//! - `ObjectStore`: content-addressed artifact storage
//! - `Foundry`: produces the binary for a resolved module set

pub mod api;
pub mod build;
pub mod catalog;
pub mod consts;
pub mod foundry;
pub mod platform;
pub mod store;
pub mod util;
pub mod version;
