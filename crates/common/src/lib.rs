//! pageprobe Common Library
//!
//! Shared snapshot and result types, the harness error type, and the
//! TOML configuration file used by the probe, runner and CLI crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::HarnessConfig;
pub use error::{Error, Result};
pub use types::*;

/// pageprobe version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default location of the harness configuration file
pub const DEFAULT_CONFIG_FILE: &str = "pageprobe.toml";
