//! Parsing and validation of simulation run configurations.
//!
//! This crate reads a TOML run description and produces a strongly-typed
//! [`RunConfig`] with stimulus-window validation, command-line overrides, and
//! built-in presets.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod overrides;
pub mod presets;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, validate_config};
pub use overrides::{apply_overrides, Override};
pub use presets::{preset, preset_description, PRESET_NAMES};
pub use types::*;
