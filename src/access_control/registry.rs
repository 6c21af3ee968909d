//! Template registry
//!
//! Maps each client type to its compiled comparison templates for one
//! resource shape. Built once at startup and read-only afterwards.

use crate::access_control::matcher::Matcher;
use crate::access_control::types::{ClientType, MatchType};
use crate::config::ComparisonTemplates;
use crate::error::{ConfigError, TemplateError};
use std::collections::HashMap;

/// Expected path of a team: its namespace plus the `/` separating names
pub const TEAM_RESOURCE_TEAM: &str = "{{ .B.Environment }}--{{ .B.Group }}--{{ .B.Team }}/";

/// Expected path of a group: every team namespace under it
pub const TEAM_RESOURCE_GROUP: &str = "{{ .B.Environment }}--{{ .B.Group }}--";

/// Expected path of an admin: every namespace in the environment
pub const TEAM_RESOURCE_ADMIN: &str = "{{ .B.Environment }}--";

/// Requested path of a namespaced resource
pub const TEAM_RESOURCE_USER_INPUT: &str = "{{ .P.Namespace }}/{{ .P.Name }}";

/// Compiled templates for one client type
#[derive(Debug, Clone)]
pub struct CompiledTemplates {
    pub matcher: Matcher,
    pub match_type: MatchType,
}

impl CompiledTemplates {
    pub fn compile(templates: &ComparisonTemplates) -> Result<Self, TemplateError> {
        Ok(Self {
            matcher: Matcher::new(&templates.expected, &templates.user_input)?,
            match_type: templates.match_type,
        })
    }
}

/// Compiled comparison templates keyed by client type
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    entries: HashMap<ClientType, CompiledTemplates>,
}

impl TemplateRegistry {
    /// Compile a registry from `(client type, templates)` pairs
    pub fn new<'a>(
        templates: impl IntoIterator<Item = (ClientType, &'a ComparisonTemplates)>,
    ) -> Result<Self, TemplateError> {
        let entries = templates
            .into_iter()
            .map(|(client_type, t)| Ok((client_type, CompiledTemplates::compile(t)?)))
            .collect::<Result<_, TemplateError>>()?;

        Ok(Self { entries })
    }

    /// Compile a registry from a config table keyed by client type name.
    ///
    /// An empty table yields the built-in team resource registry.
    pub fn from_config(
        templates: &HashMap<String, ComparisonTemplates>,
    ) -> Result<Self, ConfigError> {
        if templates.is_empty() {
            return Self::team_resource().map_err(|source| ConfigError::Template {
                location: "built-in team_resource".to_string(),
                source,
            });
        }

        let mut entries = HashMap::with_capacity(templates.len());
        for (key, t) in templates {
            let client_type = ClientType::try_parse(key).ok_or_else(|| ConfigError::Invalid {
                message: format!(
                    "unknown client type '{}' (expected one of admin, group, team)",
                    key
                ),
            })?;

            let compiled =
                CompiledTemplates::compile(t).map_err(|source| ConfigError::Template {
                    location: format!("templates.{}", key),
                    source,
                })?;
            entries.insert(client_type, compiled);
        }

        Ok(Self { entries })
    }

    /// Built-in registry for resources stored under `<env>--<group>--<team>/<name>`
    pub fn team_resource() -> Result<Self, TemplateError> {
        let team = ComparisonTemplates::new(
            TEAM_RESOURCE_TEAM,
            TEAM_RESOURCE_USER_INPUT,
            MatchType::Prefix,
        );
        let group = ComparisonTemplates::new(
            TEAM_RESOURCE_GROUP,
            TEAM_RESOURCE_USER_INPUT,
            MatchType::Prefix,
        );
        let admin = ComparisonTemplates::new(
            TEAM_RESOURCE_ADMIN,
            TEAM_RESOURCE_USER_INPUT,
            MatchType::Prefix,
        );

        Self::new([
            (ClientType::Team, &team),
            (ClientType::Group, &group),
            (ClientType::Admin, &admin),
        ])
    }

    pub fn get(&self, client_type: ClientType) -> Option<&CompiledTemplates> {
        self.entries.get(&client_type)
    }

    /// Whether templates are registered for `client_type`
    pub fn supports(&self, client_type: ClientType) -> bool {
        self.entries.contains_key(&client_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
