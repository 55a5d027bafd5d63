//! Crate-wide constants.

pub const APP_NAME: &str = "binforge";

/// Reserved name of the base program in a resolved dependency set.
pub const BASE_NAME: &str = "k6";

/// Module path of the base program.
pub const BASE_PATH: &str = "go.k6.io/k6";

/// The only base version allowed to carry build metadata (`v0.0.0+<token>`).
pub const PINNED_BASE_VERSION: &str = "v0.0.0";

/// Environment variable toggling native-code linkage in the foundry toolchain.
pub const NATIVE_LINKAGE_ENV: &str = "CGO_ENABLED";

/// Default external builder program used by the command foundry.
pub const DEFAULT_FOUNDRY_BIN: &str = "xk6";
