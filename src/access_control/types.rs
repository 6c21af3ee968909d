//! Access control types
//!
//! Core types used by the access control system.

use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust tier governing which access pattern applies to a request
///
/// Ordered from highest to lowest trust in [`ClientType::by_trust`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Admin,
    Group,
    Team,
}

impl ClientType {
    /// Get the tier name as it appears in scope entries
    pub const fn as_str(&self) -> &'static str {
        match self {
            ClientType::Admin => "admin",
            ClientType::Group => "group",
            ClientType::Team => "team",
        }
    }

    /// Try to parse a tier from a scope entry prefix or config key
    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(ClientType::Admin),
            "group" => Some(ClientType::Group),
            "team" => Some(ClientType::Team),
            _ => None,
        }
    }

    /// All tiers, highest trust first
    pub const fn by_trust() -> &'static [ClientType] {
        &[ClientType::Admin, ClientType::Group, ClientType::Team]
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Privilege level carried by a scope entry or required by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Idempotent reads (GET, HEAD, OPTIONS)
    Read,
    /// Reads and writes
    All,
}

impl AccessLevel {
    /// Parse the level part of a `"<tier>:<level>"` scope entry.
    ///
    /// Anything other than `all` grants read only, so levels such as
    /// `obfuscated` still establish tier presence for reads.
    pub fn from_scope_level(level: &str) -> Self {
        if level == "all" {
            AccessLevel::All
        } else {
            AccessLevel::Read
        }
    }

    /// Level a request with the given method requires
    pub fn required_for(method: &Method) -> Self {
        if is_read_only(method) {
            AccessLevel::Read
        } else {
            AccessLevel::All
        }
    }

    /// Whether a grant at this level satisfies `required`
    pub const fn satisfies(&self, required: AccessLevel) -> bool {
        matches!(
            (self, required),
            (AccessLevel::All, _) | (AccessLevel::Read, AccessLevel::Read)
        )
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::All => "all",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Check if a method never mutates server state
pub fn is_read_only(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

/// Comparison policy for a rendered template pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Rendered strings must be equal, ignoring case
    Equal,
    /// Rendered user input must start with the rendered expected string
    #[default]
    Prefix,
}

impl MatchType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MatchType::Equal => "equal",
            MatchType::Prefix => "prefix",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
