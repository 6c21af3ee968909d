//! Business context extraction
//!
//! Turns the claims of an already-verified token into the per-request
//! identity record the rest of the engine works on.

use crate::access_control::types::{AccessLevel, ClientType};
use crate::config::BusinessContextConfig;
use crate::error::ClaimError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim keys accepted for the environment, in lookup order
const ENVIRONMENT_CLAIMS: &[&str] = &["environment", "env"];
const GROUP_CLAIM: &str = "group";
const TEAM_CLAIM: &str = "team";
const SCOPE_CLAIM: &str = "scope";

/// Decoded claims of a verified bearer token
///
/// Inserted into the request extensions by whatever layer verifies the token.
/// Values may be strings or arrays of strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a claim, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Single string value of a claim.
    ///
    /// For array claims the first string element is used. Blank values count
    /// as absent.
    pub fn string(&self, key: &str) -> Option<&str> {
        let value = match self.0.get(key)? {
            Value::String(s) => s.as_str(),
            Value::Array(items) => items.iter().find_map(Value::as_str)?,
            _ => return None,
        };
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Whitespace-delimited entries of a claim, flattening arrays
    pub fn entries(&self, key: &str) -> Vec<&str> {
        match self.0.get(key) {
            Some(Value::String(s)) => s.split_whitespace().collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .flat_map(str::split_whitespace)
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Tenant identity plus granted scopes for the current request
///
/// Immutable once built; handlers receive it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusinessContext {
    environment: String,
    group: String,
    team: String,
    scopes: Vec<String>,
}

impl BusinessContext {
    /// Build the context from verified claims.
    ///
    /// Fails only when the environment claim is missing or blank.
    pub fn from_claims(claims: &Claims, config: &BusinessContextConfig) -> Result<Self, ClaimError> {
        let environment = ENVIRONMENT_CLAIMS
            .iter()
            .find_map(|key| claims.string(key))
            .ok_or_else(ClaimError::missing_env)?;

        let mut scopes: Vec<String> = claims
            .entries(SCOPE_CLAIM)
            .into_iter()
            .filter_map(|entry| strip_scope_prefix(entry, config.scope_prefix.as_deref()))
            .map(str::to_string)
            .collect();

        if scopes.is_empty()
            && let Some(default_scope) = config.default_scope.as_deref()
            && !default_scope.is_empty()
        {
            scopes.push(default_scope.to_string());
        }

        Ok(Self {
            environment: environment.to_string(),
            group: claims.string(GROUP_CLAIM).unwrap_or_default().to_string(),
            team: claims.string(TEAM_CLAIM).unwrap_or_default().to_string(),
            scopes,
        })
    }

    /// Construct a context directly, bypassing claim decoding
    pub fn new(
        environment: impl Into<String>,
        group: impl Into<String>,
        team: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            environment: environment.into(),
            group: group.into(),
            team: team.into(),
            scopes,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn team(&self) -> &str {
        &self.team
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Parsed `(tier, level)` grants, in scope order.
    ///
    /// Entries with an unknown tier or without a `:` are skipped.
    pub fn grants(&self) -> impl Iterator<Item = (ClientType, AccessLevel)> + '_ {
        self.scopes.iter().filter_map(|scope| {
            let (tier, level) = scope.split_once(':')?;
            let tier = ClientType::try_parse(tier)?;
            Some((tier, AccessLevel::from_scope_level(level)))
        })
    }
}

/// Entries that do not carry the configured prefix belong to another audience
fn strip_scope_prefix<'a>(entry: &'a str, prefix: Option<&str>) -> Option<&'a str> {
    match prefix {
        Some(prefix) if !prefix.is_empty() => entry.strip_prefix(prefix),
        _ => Some(entry),
    }
}
