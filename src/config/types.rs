//! Configuration types for tenant-authz
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::access_control::types::MatchType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shape used when no shape is named explicitly
pub const DEFAULT_SHAPE: &str = "team_resource";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Claim decoding settings
    pub business_context: BusinessContextConfig,

    /// Resource shapes, keyed by name
    pub shapes: HashMap<String, ShapeConfig>,
}

impl AppConfig {
    /// Look up a shape by name.
    ///
    /// An unconfigured [`DEFAULT_SHAPE`] resolves to the built-in team
    /// resource shape.
    pub fn shape(&self, name: &str) -> Option<ShapeConfig> {
        match self.shapes.get(name) {
            Some(shape) => Some(shape.clone()),
            None if name == DEFAULT_SHAPE => Some(ShapeConfig::default()),
            None => None,
        }
    }
}

/// How claims are turned into a business context
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BusinessContextConfig {
    /// Prefix stripped from every scope entry; entries without it are ignored
    pub scope_prefix: Option<String>,

    /// Scope used when the token carries none
    pub default_scope: Option<String>,
}

/// A mountable resource shape
///
/// An empty `templates` table means the built-in team resource templates.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ShapeConfig {
    /// Route parameter keys exposed to templates as `.P.<Key>`
    pub path_params: Vec<String>,

    /// Comparison templates keyed by client type (`team`, `group`, `admin`)
    pub templates: HashMap<String, ComparisonTemplates>,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            path_params: default_path_params(),
            templates: HashMap::new(),
        }
    }
}

pub fn default_path_params() -> Vec<String> {
    vec!["namespace".to_string(), "name".to_string()]
}

/// Template pair plus match policy for one client type
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ComparisonTemplates {
    /// Template over `.B`, rendering the authorized resource path
    #[serde(alias = "expected_template")]
    pub expected: String,

    /// Template over `.P`, rendering the requested resource path
    #[serde(alias = "user_input_template")]
    pub user_input: String,

    #[serde(default)]
    pub match_type: MatchType,
}

impl ComparisonTemplates {
    pub fn new(
        expected: impl Into<String>,
        user_input: impl Into<String>,
        match_type: MatchType,
    ) -> Self {
        Self {
            expected: expected.into(),
            user_input: user_input.into(),
            match_type,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
