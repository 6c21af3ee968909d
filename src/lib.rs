//! Tenant Authz
//!
//! Multi-tenant resource access control for REST APIs.
//!
//! ## Features
//!
//! - **Trust tiers** - `admin`, `group` and `team` scopes from verified token claims
//! - **Path templates** - per-tier expected/user-input templates compared by prefix or equality
//! - **Tenant prefixes** - every allowed request carries the prefix its data access is scoped to
//! - **Tower middleware** for axum routes
//! - **Flexible configuration** via TOML files and environment variables
//!
//! ## Decision Model
//!
//! ```text
//! claims → business context → client type → rendered templates → allow + prefix | 403
//! ```
//!
//! Denials are always `403 Forbidden` with one of three plain-text bodies:
//! `Missing field 'env'`, `Invalid authorization context` or
//! `Access to requested resource not allowed`.
//!
//! ## Example Configuration
//!
//! ```toml
//! [business_context]
//! default_scope = "team:read"
//!
//! [shapes.organizations]
//! path_params = ["namespace", "name"]
//!
//! [shapes.organizations.templates.team]
//! expected = "{{ .B.Environment }}/{{ .B.Group }}--{{ .B.Team }}"
//! user_input = "{{ .P.Namespace }}/{{ .P.Name }}"
//! match_type = "equal"
//! ```

pub mod access_control;
pub mod config;
pub mod error;
pub mod middleware;

// Re-export main types
pub use access_control::{AccessGrant, BusinessContext, CheckAccess, Claims, TenantPrefix};
pub use config::{AppConfig, load_config};
pub use error::{AccessError, AppError, Result};
pub use middleware::CheckAccessLayer;
