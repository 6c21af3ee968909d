//! Error types for tenant-authz
//!
//! Request-level failures (`AccessError`) are always answered with a
//! `403 Forbidden` and a fixed plain-text body. Their `Display` output *is*
//! that body, so nothing about the expected resource path or the missing
//! identity field ever reaches the caller.
//!
//! `TemplateError` and `ConfigError` are deployment faults. They surface while
//! the registry is built at startup, never while a request is evaluated.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Body for a token whose claims carry a tier but not the identity backing it
pub const INVALID_CONTEXT: &str = "Invalid authorization context";

/// Body for every "well-formed but not permitted" decision
pub const NOT_ALLOWED: &str = "Access to requested resource not allowed";

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Claims must be a JSON object: {0}")]
    Claims(#[source] serde_json::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid template in {location}: {source}")]
    Template {
        location: String,
        #[source]
        source: TemplateError,
    },
}

/// Template compilation errors
///
/// `offset` is the byte position in `template` where parsing stopped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template text is empty")]
    Empty,

    #[error("unterminated action at offset {offset} in '{template}'")]
    Unterminated { template: String, offset: usize },

    #[error("unexpected '{token}' at offset {offset} in '{template}'")]
    Unexpected {
        template: String,
        token: String,
        offset: usize,
    },

    #[error("unknown field '.B.{field}' in '{template}' (expected one of Environment, Group, Team, Scopes)")]
    UnknownField { template: String, field: String },

    #[error("unknown function '{name}' in '{template}'")]
    UnknownFunction { template: String, name: String },

    #[error("function '{name}' expects {expected} arguments, got {got} in '{template}'")]
    Arity {
        template: String,
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("unbalanced '{keyword}' in '{template}'")]
    Unbalanced { template: String, keyword: String },
}

/// A required claim is absent from the decoded token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing field '{field}'")]
pub struct ClaimError {
    pub field: &'static str,
}

impl ClaimError {
    pub fn missing_env() -> Self {
        Self { field: "env" }
    }
}

/// The resolved tier implies an identity field that the token left blank
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid authorization context")]
pub struct ContextError {
    /// Name of the blank field, for logs only
    pub field: &'static str,
}

/// The context is well-formed but the request is not permitted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Access to requested resource not allowed")]
pub struct AuthorizationError {
    /// Internal reason, for logs only
    pub reason: String,
}

impl AuthorizationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn no_qualifying_scope() -> Self {
        Self::new("no scope grants the required level")
    }

    pub fn mismatch() -> Self {
        Self::new("rendered resource path does not match")
    }

    pub fn unsupported_client_type(client_type: impl std::fmt::Display) -> Self {
        Self::new(format!("no templates registered for client type '{}'", client_type))
    }
}

/// Request-level authorization failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

impl AccessError {
    pub fn status(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for per-request decisions
pub type AccessResult<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_error_bodies() {
        assert_eq!(
            AccessError::from(ClaimError::missing_env()).to_string(),
            "Missing field 'env'"
        );
        assert_eq!(
            AccessError::from(ContextError { field: "team" }).to_string(),
            INVALID_CONTEXT
        );
        assert_eq!(
            AccessError::from(AuthorizationError::mismatch()).to_string(),
            NOT_ALLOWED
        );
    }

    #[test]
    fn test_reasons_do_not_leak() {
        let err = AccessError::from(AuthorizationError::new("expected test--eni--"));
        assert!(!err.to_string().contains("test--eni--"));

        let err = AccessError::from(ContextError { field: "group" });
        assert!(!err.to_string().contains("group"));
    }

    #[test]
    fn test_app_error_wraps_sources() {
        let err = AppError::from(TemplateError::Empty);
        assert_eq!(err.to_string(), "Template error: template text is empty");

        let err = AppError::from(ConfigError::Missing {
            field: "default_scope".to_string(),
        });
        assert!(matches!(err, AppError::Config(ConfigError::Missing { .. })));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = AppError::Claims(json_err);
        assert!(err.to_string().starts_with("Claims must be a JSON object"));
    }

    #[test]
    fn test_access_error_is_forbidden() {
        let response = AccessError::from(AuthorizationError::mismatch()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
