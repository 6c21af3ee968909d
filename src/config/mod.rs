//! Configuration module
//!
//! Loads logging, claim decoding and resource shape settings from TOML files
//! and environment variables. Every configured template is compiled during
//! validation, so a broken shape fails at startup.

pub mod loader;
pub mod types;

pub use loader::{load_config, load_config_from_str};
pub use types::*;
