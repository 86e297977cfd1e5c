//! Library half of `scanpoolctl`: configuration loading plus the `decode` and
//! `bench` drivers, kept out of `main.rs` so they can be tested directly.

pub mod bench;
pub mod config;
pub mod decode;

pub use config::{ConfigLoad, ConfigLoadError, ConfigLoader};
