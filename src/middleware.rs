//! Tower middleware running [`CheckAccess`] for axum routes
//!
//! The layer depends on route path parameters, so it has to be attached with
//! [`axum::Router::route_layer`]:
//!
//! ```no_run
//! use axum::{Extension, Router, routing::get};
//! use tenant_authz::access_control::{CheckAccess, TenantPrefix};
//! use tenant_authz::middleware::CheckAccessLayer;
//!
//! async fn list(Extension(prefix): Extension<TenantPrefix>) -> String {
//!     format!("listing {}", prefix)
//! }
//!
//! let check = CheckAccess::builder().build().unwrap();
//! let app: Router = Router::new()
//!     .route("/foos", get(list))
//!     .route("/foos/{namespace}/{name}", get(list))
//!     .route_layer(CheckAccessLayer::new(check));
//! ```
//!
//! Verified claims are read from the [`Claims`] request extension, which the
//! token-verifying layer in front of this one must insert. On allow, the
//! `Arc<BusinessContext>`, the [`TenantPrefix`] and the resolved
//! [`ClientType`] are added to the request extensions.
//!
//! [`ClientType`]: crate::access_control::ClientType
//! [`TenantPrefix`]: crate::access_control::TenantPrefix

use crate::access_control::{CheckAccess, Claims};
use crate::error::{AccessError, AuthorizationError};
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

/// Layer wrapping routes with an access check
#[derive(Debug, Clone)]
pub struct CheckAccessLayer {
    check: CheckAccess,
}

impl CheckAccessLayer {
    pub fn new(check: CheckAccess) -> Self {
        Self { check }
    }

    pub fn check(&self) -> &CheckAccess {
        &self.check
    }
}

impl<S> Layer<S> for CheckAccessLayer {
    type Service = CheckAccessService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CheckAccessService {
            inner,
            check: self.check.clone(),
        }
    }
}

/// Service produced by [`CheckAccessLayer`]
#[derive(Debug, Clone)]
pub struct CheckAccessService<S> {
    inner: S,
    check: CheckAccess,
}

impl<S, B> Service<Request<B>> for CheckAccessService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let check = self.check.clone();
        // Keep the instance that was polled ready
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();

            let route_params = match RawPathParams::from_request_parts(&mut parts, &()).await {
                Ok(params) => Some(params),
                Err(RawPathParamsRejection::MissingPathParams(_)) => None,
                Err(rejection) => {
                    warn!(%rejection, "Failed to extract path parameters");
                    let denied = AccessError::from(AuthorizationError::new(rejection.body_text()));
                    return Ok(denied.into_response());
                }
            };

            let claims = parts
                .extensions
                .get::<Claims>()
                .cloned()
                .unwrap_or_default();

            let decision = match &route_params {
                Some(params) => check.check(&claims, &parts.method, params.iter()),
                None => check.check(&claims, &parts.method, std::iter::empty::<(&str, &str)>()),
            };

            match decision {
                Ok(grant) => {
                    parts.extensions.insert(grant.context);
                    parts.extensions.insert(grant.prefix);
                    parts.extensions.insert(grant.client_type);
                    inner.call(Request::from_parts(parts, body)).await
                }
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}
