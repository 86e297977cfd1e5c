//! Layered configuration for the CLI: built-in defaults, then a TOML file,
//! then `SCANPOOL_*` environment variables. Command line flags are applied
//! last by the binary.

pub mod loader;
pub mod sources;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions,
    ConfigMetadata, duration_to_ms, parse_fault_policy, render_toml,
};
pub use sources::{EnvConfig, FileConfig, FilePoolConfig};
pub use validation::{ConfigWarning, ConfigWarnings};
