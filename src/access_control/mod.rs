//! Access control module
//!
//! Decides whether a request may touch a tenant-scoped resource, and if so,
//! which tenant prefix downstream data access is restricted to.
//!
//! ## Decision Model
//!
//! Every request goes through the same stages:
//!
//! 1. **Business context** - decode `env`, `group`, `team` and `scope` from the
//!    verified token claims
//! 2. **Privilege** - pick the governing client type. Tiers are scanned in
//!    trust order (`admin > group > team`) for a scope entry granting the level
//!    the method requires (`read` for GET/HEAD/OPTIONS, `all` otherwise)
//! 3. **Comparison** - render the client type's expected template (`.B`) and
//!    user-input template (`.P`) and compare them by prefix or by
//!    case-insensitive equality
//!
//! Requests without any path parameter skip the comparison.
//!
//! ## Example Configuration
//!
//! ```toml
//! [business_context]
//! default_scope = "team:read"
//!
//! [shapes.rovers]
//! path_params = ["name"]
//!
//! [shapes.rovers.templates.team]
//! expected = "{{ .B.Environment }}--{{ .B.Group }}--{{ .B.Team }}--"
//! user_input = "{{ .B.Environment }}--{{ .P.Name }}"
//!
//! [shapes.rovers.templates.admin]
//! expected = "{{ .B.Environment }}--"
//! user_input = "{{ .B.Environment }}--{{ .P.Name }}"
//! match_type = "prefix"
//! ```

pub mod check;
pub mod context;
pub mod matcher;
pub mod privilege;
pub mod registry;
pub mod template;
pub mod types;

pub use check::{
    AccessGrant, CheckAccess, CheckAccessBuilder, PathParams, RequestType, ResourcePathFn,
    TenantPrefix,
};
pub use context::{BusinessContext, Claims};
pub use matcher::{CompareCtxInfo, Matcher, compare, render, title_case};
pub use privilege::{Privilege, resolve};
pub use registry::{CompiledTemplates, TemplateRegistry};
pub use template::Template;
pub use types::{AccessLevel, ClientType, MatchType, is_read_only};
