//! Configuration loading tests

use axum::http::Method;
use tenant_authz::access_control::{CheckAccess, Claims, ClientType, MatchType};
use tenant_authz::config::{DEFAULT_SHAPE, LogFormat, load_config_from_str};
use tenant_authz::error::ConfigError;

const MINIMAL_CONFIG: &str = r#"
[business_context]
default_scope = "team:read"
"#;

const FULL_CONFIG: &str = r#"
[logging]
level = "debug"
format = "json"

[business_context]
scope_prefix = "tardis:"
default_scope = "team:read"

[shapes.rovers]
path_params = ["name"]

[shapes.rovers.templates.team]
expected = "{{ .B.Environment }}--{{ .B.Group }}--{{ .B.Team }}--"
user_input = "{{ .B.Environment }}--{{ .P.Name }}"

[shapes.rovers.templates.group]
expected = "{{ .B.Environment }}--{{ .B.Group }}--"
user_input = "{{ .B.Environment }}--{{ .P.Name }}"
match_type = "prefix"

[shapes.rovers.templates.admin]
expected_template = "{{ .B.Environment }}--"
user_input_template = "{{ .B.Environment }}--{{ .P.Name }}"

[shapes.organizations.templates.team]
expected = "{{ .B.Environment }}/{{ .B.Group }}--{{ .B.Team }}"
user_input = "{{ .P.Namespace }}/{{ .P.Name }}"
match_type = "equal"
"#;

#[test]
fn test_minimal_config() {
    let config = load_config_from_str(MINIMAL_CONFIG).unwrap();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert_eq!(
        config.business_context.default_scope.as_deref(),
        Some("team:read")
    );
    assert!(config.business_context.scope_prefix.is_none());
    assert!(config.shapes.is_empty());
}

#[test]
fn test_full_config() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(
        config.business_context.scope_prefix.as_deref(),
        Some("tardis:")
    );

    let rovers = config.shape("rovers").unwrap();
    assert_eq!(rovers.path_params, vec!["name"]);
    assert_eq!(rovers.templates.len(), 3);
    assert_eq!(rovers.templates["admin"].expected, "{{ .B.Environment }}--");

    let organizations = config.shape("organizations").unwrap();
    assert_eq!(organizations.path_params, vec!["namespace", "name"]);
    assert_eq!(
        organizations.templates["team"].match_type,
        MatchType::Equal
    );
}

#[test]
fn test_empty_config() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.logging.level, "info");
    assert!(config.shape(DEFAULT_SHAPE).is_some());
}

#[test]
fn test_shape_drives_check_access() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();
    let shape = config.shape("rovers").unwrap();
    let check = CheckAccess::from_shape(&shape, &config.business_context).unwrap();

    assert_eq!(check.path_param_keys(), &["name".to_string()]);
    assert_eq!(check.registry().len(), 3);

    let claims = Claims::new()
        .with("env", "test")
        .with("group", "group")
        .with("team", "team")
        .with("scope", "openid tardis:group:read");

    let grant = check
        .check(&claims, &Method::GET, [("name", "group--foo--rover")])
        .unwrap();
    assert_eq!(grant.client_type, ClientType::Group);
    assert_eq!(grant.prefix.as_str(), "test--group--");
}

#[test]
fn test_default_shape_uses_team_resource_templates() {
    let config = load_config_from_str(MINIMAL_CONFIG).unwrap();
    let shape = config.shape(DEFAULT_SHAPE).unwrap();
    let check = CheckAccess::from_shape(&shape, &config.business_context).unwrap();

    let claims = Claims::new()
        .with("env", "test")
        .with("group", "group")
        .with("team", "team");
    let grant = check
        .check(&claims, &Method::GET, [("namespace", "test--group--team")])
        .unwrap();
    assert_eq!(grant.prefix.as_str(), "test--group--team/");
}

#[test]
fn test_invalid_match_type() {
    let config_str = r#"
[shapes.bad.templates.team]
expected = "{{ .B.Environment }}"
user_input = "{{ .P.Namespace }}"
match_type = "suffix"
"#;

    let result = load_config_from_str(config_str);
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
fn test_unknown_function_in_template() {
    let config_str = r#"
[shapes.bad.templates.group]
expected = "{{ upper .B.Group }}"
user_input = "{{ .P.Namespace }}"
"#;

    let err = load_config_from_str(config_str).unwrap_err();
    assert!(matches!(err, ConfigError::Template { .. }));
    assert!(err.to_string().contains("shapes.bad.templates.group"));
}

#[test]
fn test_empty_template_text() {
    let config_str = r#"
[shapes.bad.templates.admin]
expected = ""
user_input = "{{ .P.Namespace }}"
"#;

    assert!(load_config_from_str(config_str).is_err());
}

#[test]
#[serial_test::serial]
fn test_load_config_from_file() {
    use std::fs;
    use tenant_authz::config::load_config;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("tenant-authz.toml");
    fs::write(&config_path, FULL_CONFIG).unwrap();

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();
    assert_eq!(config.shapes.len(), 2);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
#[serial_test::serial]
fn test_env_var_overrides_file() {
    use std::env;
    use std::fs;
    use tenant_authz::config::load_config;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("tenant-authz.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::set_var("TENANT_AUTHZ_BUSINESS_CONTEXT__DEFAULT_SCOPE", "group:read");
        env::set_var("TENANT_AUTHZ_LOGGING__LEVEL", "warn");
    }

    let config = load_config(Some(config_path.to_str().unwrap()));

    unsafe {
        env::remove_var("TENANT_AUTHZ_BUSINESS_CONTEXT__DEFAULT_SCOPE");
        env::remove_var("TENANT_AUTHZ_LOGGING__LEVEL");
    }

    let config = config.unwrap();
    assert_eq!(
        config.business_context.default_scope.as_deref(),
        Some("group:read")
    );
    assert_eq!(config.logging.level, "warn");
}

#[test]
#[serial_test::serial]
fn test_env_var_invalid_value_is_rejected() {
    use std::env;
    use std::fs;
    use tenant_authz::config::load_config;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("tenant-authz.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::set_var("TENANT_AUTHZ_LOGGING__LEVEL", "chatty");
    }

    let result = load_config(Some(config_path.to_str().unwrap()));

    unsafe {
        env::remove_var("TENANT_AUTHZ_LOGGING__LEVEL");
    }

    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}
