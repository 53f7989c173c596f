//! Configuration module for deve.
//!
//! Handles loading and validating configuration from TOML files.

mod settings;

pub use settings::*;
