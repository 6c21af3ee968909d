//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (TENANT_AUTHZ_*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::access_control::registry::TemplateRegistry;
use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "tenant-authz.toml",
    ".tenant-authz.toml",
    "~/.config/tenant-authz/config.toml",
    "/etc/tenant-authz/config.toml",
];

const ENV_PREFIX: &str = "TENANT_AUTHZ";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        let expanded = shellexpand::tilde(path);
        if !Path::new(expanded.as_ref()).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with TENANT_AUTHZ_ prefix
    // e.g., TENANT_AUTHZ_BUSINESS_CONTEXT__DEFAULT_SCOPE
    // Double underscore (__) maps to nested keys (business_context.default_scope)
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // Build and deserialize
    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::Invalid {
            message: format!(
                "logging.level must be one of {}, got: {}",
                LOG_LEVELS.join(", "),
                config.logging.level
            ),
        });
    }

    if let Some(default_scope) = &config.business_context.default_scope
        && !default_scope.is_empty()
        && !default_scope.contains(':')
    {
        return Err(ConfigError::Invalid {
            message: format!(
                "business_context.default_scope must look like '<tier>:<level>', got: {}",
                default_scope
            ),
        });
    }

    validate_shapes(config)
}

/// Compile every configured template so bad ones fail at startup
fn validate_shapes(config: &AppConfig) -> Result<(), ConfigError> {
    for (name, shape) in &config.shapes {
        if shape.path_params.is_empty() {
            return Err(ConfigError::Missing {
                field: format!("shapes.{}.path_params", name),
            });
        }

        if let Some(key) = shape.path_params.iter().find(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                message: format!("shapes.{}.path_params contains an empty key: '{}'", name, key),
            });
        }

        TemplateRegistry::from_config(&shape.templates).map_err(|e| match e {
            ConfigError::Template { location, source } => ConfigError::Template {
                location: format!("shapes.{}.{}", name, location),
                source,
            },
            ConfigError::Invalid { message } => ConfigError::Invalid {
                message: format!("shapes.{}: {}", name, message),
            },
            other => other,
        })?;
    }

    Ok(())
}
