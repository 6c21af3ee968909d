//! Access check orchestration
//!
//! Runs one request through claim decoding, privilege resolution and template
//! comparison, yielding either an [`AccessGrant`] or the [`AccessError`] to
//! answer with. Independent of any HTTP framework; see
//! [`crate::middleware`] for the tower integration.
//!
//! Requests whose path parameters are all empty are *global* (collection
//! level, e.g. `GET /foos`). No templates are compared for them; they are
//! allowed iff the registry covers the resolved client type.

use crate::access_control::context::{BusinessContext, Claims};
use crate::access_control::matcher::CompareCtxInfo;
use crate::access_control::privilege;
use crate::access_control::registry::TemplateRegistry;
use crate::access_control::types::ClientType;
use crate::config::{BusinessContextConfig, ShapeConfig, default_path_params};
use crate::error::{AccessError, AccessResult, AuthorizationError, ConfigError, TemplateError};
use axum::http::Method;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Path parameters of the matched route, keyed by their configured name
pub type PathParams = HashMap<String, String>;

/// Computes a resource path for a resolved client type
///
/// Used both to override the expected path and to compute the tenant prefix.
pub type ResourcePathFn = Arc<
    dyn Fn(&BusinessContext, ClientType, &PathParams) -> Result<String, AuthorizationError>
        + Send
        + Sync,
>;

/// Tenant-scoping prefix handed to downstream data access
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantPrefix(String);

impl TenantPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a store key `<namespace>/<name>` lies within this tenant
    pub fn contains(&self, key: &str) -> bool {
        key.starts_with(&self.0)
    }
}

impl fmt::Display for TenantPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a request addresses a collection or a single resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Global,
    Namespaced,
}

impl RequestType {
    fn of(params: &PathParams) -> Self {
        if params.values().all(String::is_empty) {
            RequestType::Global
        } else {
            RequestType::Namespaced
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestType::Global => "global",
            RequestType::Namespaced => "namespaced",
        }
    }
}

/// Result of a successful check
#[derive(Debug, Clone, Serialize)]
pub struct AccessGrant {
    pub context: Arc<BusinessContext>,
    pub client_type: ClientType,
    pub request_type: RequestType,
    pub prefix: TenantPrefix,
}

/// Per-route access checker
///
/// Cheap to clone; the compiled registry is shared.
#[derive(Clone)]
pub struct CheckAccess {
    registry: Arc<TemplateRegistry>,
    context_config: BusinessContextConfig,
    path_param_keys: Vec<String>,
    expected_path: Option<ResourcePathFn>,
    prefix: Option<ResourcePathFn>,
}

impl fmt::Debug for CheckAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckAccess")
            .field("registry", &self.registry)
            .field("context_config", &self.context_config)
            .field("path_param_keys", &self.path_param_keys)
            .field("expected_path", &self.expected_path.is_some())
            .field("prefix", &self.prefix.is_some())
            .finish()
    }
}

impl CheckAccess {
    /// Checker with default options over `registry`
    pub fn new(registry: TemplateRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            context_config: BusinessContextConfig::default(),
            path_param_keys: default_path_params(),
            expected_path: None,
            prefix: None,
        }
    }

    pub fn builder() -> CheckAccessBuilder {
        CheckAccessBuilder::default()
    }

    /// Checker for a configured resource shape
    pub fn from_shape(
        shape: &ShapeConfig,
        context_config: &BusinessContextConfig,
    ) -> Result<Self, ConfigError> {
        let registry = TemplateRegistry::from_config(&shape.templates)?;
        Ok(Self {
            registry: Arc::new(registry),
            context_config: context_config.clone(),
            path_param_keys: shape.path_params.clone(),
            expected_path: None,
            prefix: None,
        })
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn path_param_keys(&self) -> &[String] {
        &self.path_param_keys
    }

    pub fn context_config(&self) -> &BusinessContextConfig {
        &self.context_config
    }

    /// Pick the configured keys out of the route's parameters.
    ///
    /// Keys the route does not define map to `""`.
    pub fn extract_params<K, V>(&self, route_params: impl IntoIterator<Item = (K, V)>) -> PathParams
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params: PathParams = self
            .path_param_keys
            .iter()
            .map(|key| (key.clone(), String::new()))
            .collect();

        for (key, value) in route_params {
            if let Some(slot) = params.get_mut(key.as_ref()) {
                *slot = value.as_ref().to_string();
            }
        }
        params
    }

    /// Decide a request from its verified claims
    pub fn check<K, V>(
        &self,
        claims: &Claims,
        method: &Method,
        route_params: impl IntoIterator<Item = (K, V)>,
    ) -> AccessResult<AccessGrant>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params = self.extract_params(route_params);

        let context = match BusinessContext::from_claims(claims, &self.context_config) {
            Ok(context) => context,
            Err(e) => {
                info!(method = %method, reason = %e, "Access denied");
                return Err(e.into());
            }
        };

        self.authorize(Arc::new(context), method, &params)
    }

    /// Decide a request for an already-built business context
    pub fn authorize(
        &self,
        context: Arc<BusinessContext>,
        method: &Method,
        params: &PathParams,
    ) -> AccessResult<AccessGrant> {
        let request_type = RequestType::of(params);

        debug!(
            method = %method,
            request_type = request_type.as_str(),
            env = context.environment(),
            group = context.group(),
            team = context.team(),
            "Evaluating access"
        );

        let client_type = match privilege::resolve(&context, method) {
            Ok(privilege) => privilege.client_type,
            Err(e) => {
                log_decision(&context, method, request_type, None, Some(&e));
                return Err(e);
            }
        };

        let decision = match request_type {
            RequestType::Global if self.registry.supports(client_type) => Ok(()),
            RequestType::Global => Err(AuthorizationError::unsupported_client_type(client_type)),
            RequestType::Namespaced => self.check_namespaced(&context, client_type, params),
        };

        let prefix = decision.and_then(|()| {
            self.prefix_for(&context, client_type, params)
                .inspect_err(|e| {
                    error!(
                        client_type = %client_type,
                        reason = %e.reason,
                        "Failed to calculate prefix"
                    );
                })
        });

        match prefix {
            Ok(prefix) => {
                log_decision(&context, method, request_type, Some(client_type), None);
                Ok(AccessGrant {
                    context,
                    client_type,
                    request_type,
                    prefix: TenantPrefix(prefix),
                })
            }
            Err(e) => {
                let e = AccessError::from(e);
                log_decision(&context, method, request_type, Some(client_type), Some(&e));
                Err(e)
            }
        }
    }

    fn check_namespaced(
        &self,
        context: &BusinessContext,
        client_type: ClientType,
        params: &PathParams,
    ) -> Result<(), AuthorizationError> {
        let entry = self
            .registry
            .get(client_type)
            .ok_or_else(|| AuthorizationError::unsupported_client_type(client_type))?;

        let ctx = CompareCtxInfo::new(context, params.iter());
        let matched = match &self.expected_path {
            Some(expected_path) => {
                let expected = expected_path(context, client_type, params)?;
                entry
                    .matcher
                    .matches_expected(&expected, entry.match_type, &ctx)
            }
            None => entry.matcher.matches(entry.match_type, &ctx),
        };

        match matched {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthorizationError::mismatch()),
            Err(e) => {
                warn!(
                    client_type = %client_type,
                    match_type = %entry.match_type,
                    reason = %e.reason,
                    "Failed to evaluate templates"
                );
                Err(e)
            }
        }
    }

    /// Expected resource path for `client_type`
    pub fn expected_path(
        &self,
        context: &BusinessContext,
        client_type: ClientType,
        params: &PathParams,
    ) -> Result<String, AuthorizationError> {
        if let Some(expected_path) = &self.expected_path {
            return expected_path(context, client_type, params);
        }

        let entry = self
            .registry
            .get(client_type)
            .ok_or_else(|| AuthorizationError::unsupported_client_type(client_type))?;
        Ok(entry
            .matcher
            .expected_string(&CompareCtxInfo::new(context, params.iter())))
    }

    /// Tenant prefix for `client_type`.
    ///
    /// Defaults to the expected path, with a `/` appended for teams so the
    /// prefix covers the namespace part of `<namespace>/<name>` store keys.
    /// An empty prefix would scope nothing, so it is an error.
    pub fn prefix_for(
        &self,
        context: &BusinessContext,
        client_type: ClientType,
        params: &PathParams,
    ) -> Result<String, AuthorizationError> {
        let mut prefix = match &self.prefix {
            Some(prefix) => prefix(context, client_type, params)?,
            None => self.expected_path(context, client_type, params)?,
        };

        if prefix.is_empty() {
            return Err(AuthorizationError::new("prefix is empty"));
        }
        if self.prefix.is_none() && client_type == ClientType::Team && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Ok(prefix)
    }
}

fn log_decision(
    context: &BusinessContext,
    method: &Method,
    request_type: RequestType,
    client_type: Option<ClientType>,
    denied: Option<&AccessError>,
) {
    let client_type = client_type.map(|c| c.as_str()).unwrap_or_default();
    match denied {
        None => info!(
            method = %method,
            request_type = request_type.as_str(),
            env = context.environment(),
            group = context.group(),
            team = context.team(),
            client_type,
            "Access granted"
        ),
        Some(e) => info!(
            method = %method,
            request_type = request_type.as_str(),
            env = context.environment(),
            group = context.group(),
            team = context.team(),
            client_type,
            reason = ?e,
            "Access denied"
        ),
    }
}

/// Builder for [`CheckAccess`]
#[derive(Default)]
pub struct CheckAccessBuilder {
    registry: Option<TemplateRegistry>,
    context_config: BusinessContextConfig,
    path_param_keys: Option<Vec<String>>,
    expected_path: Option<ResourcePathFn>,
    prefix: Option<ResourcePathFn>,
}

impl CheckAccessBuilder {
    /// Templates to compare; defaults to [`TemplateRegistry::team_resource`]
    pub fn registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn context_config(mut self, config: BusinessContextConfig) -> Self {
        self.context_config = config;
        self
    }

    pub fn scope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.context_config.scope_prefix = Some(prefix.into());
        self
    }

    pub fn default_scope(mut self, scope: impl Into<String>) -> Self {
        self.context_config.default_scope = Some(scope.into());
        self
    }

    /// Route parameter keys fed into `.P`; defaults to `namespace`, `name`
    pub fn path_param_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_param_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Compute the expected path directly instead of rendering the expected template
    pub fn expected_path<F>(mut self, f: F) -> Self
    where
        F: Fn(&BusinessContext, ClientType, &PathParams) -> Result<String, AuthorizationError>
            + Send
            + Sync
            + 'static,
    {
        self.expected_path = Some(Arc::new(f));
        self
    }

    /// Compute the tenant prefix instead of deriving it from the expected path
    pub fn prefix<F>(mut self, f: F) -> Self
    where
        F: Fn(&BusinessContext, ClientType, &PathParams) -> Result<String, AuthorizationError>
            + Send
            + Sync
            + 'static,
    {
        self.prefix = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<CheckAccess, TemplateError> {
        let registry = match self.registry {
            Some(registry) if !registry.is_empty() => registry,
            _ => TemplateRegistry::team_resource()?,
        };

        Ok(CheckAccess {
            registry: Arc::new(registry),
            context_config: self.context_config,
            path_param_keys: self.path_param_keys.unwrap_or_else(default_path_params),
            expected_path: self.expected_path,
            prefix: self.prefix,
        })
    }
}
