//! Privilege resolution
//!
//! Selects the single trust tier that governs a request. Tiers are scanned in
//! trust order (`admin > group > team`); the first one holding a grant at the
//! level the method requires wins. A tier that needs an identity field the
//! token does not carry is rejected as an invalid context rather than a
//! mismatch.

use crate::access_control::context::BusinessContext;
use crate::access_control::types::{AccessLevel, ClientType};
use crate::error::{AccessError, AuthorizationError, ContextError};
use axum::http::Method;
use tracing::trace;

/// Outcome of privilege resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Privilege {
    pub client_type: ClientType,
    pub required: AccessLevel,
}

/// Resolve the governing tier for `ctx` and `method`
pub fn resolve(ctx: &BusinessContext, method: &Method) -> Result<Privilege, AccessError> {
    let required = AccessLevel::required_for(method);

    let client_type = ClientType::by_trust()
        .iter()
        .copied()
        .find(|tier| {
            ctx.grants()
                .any(|(granted, level)| granted == *tier && level.satisfies(required))
        })
        .ok_or_else(AuthorizationError::no_qualifying_scope)?;

    trace!(client_type = %client_type, required = %required, "Resolved client type");

    match client_type {
        ClientType::Team if ctx.team().is_empty() => Err(ContextError { field: "team" }.into()),
        ClientType::Group if ctx.group().is_empty() => Err(ContextError { field: "group" }.into()),
        _ => Ok(Privilege {
            client_type,
            required,
        }),
    }
}
