//! Template language and matcher tests

use rstest::rstest;
use tenant_authz::access_control::{
    BusinessContext, CompareCtxInfo, MatchType, Matcher, Template, render,
};
use tenant_authz::error::TemplateError;

fn business() -> BusinessContext {
    BusinessContext::new(
        "test",
        "eni",
        "hyperion",
        vec!["team:read".to_string(), "admin:all".to_string()],
    )
}

fn render_with(template: &str, params: &[(&str, &str)]) -> String {
    let b = business();
    let ctx = CompareCtxInfo::new(&b, params.iter().copied());
    render(template, &ctx).unwrap()
}

#[rstest]
#[case::business_fields("{{ .B.Environment }}--{{ .B.Group }}--{{ .B.Team }}", &[], "test--eni--hyperion")]
#[case::path_params("{{ .P.Namespace }}/{{ .P.Name }}", &[("namespace", "ns"), ("name", "n")], "ns/n")]
#[case::title_cased_key("{{ .P.Resourceid }}", &[("resourceId", "42")], "42")]
#[case::missing_param_is_empty("{{ .P.Namespace }}/{{ .P.Name }}", &[("namespace", "ns")], "ns/")]
#[case::scopes_list("{{ .B.Scopes }}", &[], "[team:read admin:all]")]
#[case::split("{{ split .P.Name \"--\" }}", &[("name", "a--b--c")], "[a b c]")]
#[case::last_part("{{ lastPart .P.Name \"--\" }}", &[("name", "eni--hyperion")], "hyperion")]
#[case::last_part_without_separator("x{{ lastPart .P.Name \"--\" }}", &[("name", "eni")], "x")]
#[case::contains("{{ contains .P.Name \"--\" }}", &[("name", "a--b")], "true")]
#[case::nested_call("{{ lastPart (lastPart .P.Name \"/\") \"--\" }}", &[("name", "x/eni--team")], "team")]
#[case::trim_markers("a  {{- .B.Group -}}  b", &[], "aenib")]
#[case::literal("{{ \"--\" }}", &[], "--")]
fn test_render(#[case] template: &str, #[case] params: &[(&str, &str)], #[case] expected: &str) {
    assert_eq!(render_with(template, params), expected);
}

#[rstest]
#[case::with_team_suffix(&[("namespace", "test"), ("name", "eni--hyperion")], "test/eni--hyperion")]
#[case::group_only(&[("namespace", "test"), ("name", "eni")], "test/eni")]
#[case::global(&[], "test/eni")]
fn test_optional_team_suffix(#[case] params: &[(&str, &str)], #[case] expected: &str) {
    let template = r#"{{ .B.Environment }}/{{ .B.Group }}{{ if contains .P.Name "--" }}--{{ lastPart .P.Name "--" }}{{ end }}"#;
    assert_eq!(render_with(template, params), expected);
}

#[test]
fn test_if_else() {
    let template = "{{ if .P.Name }}named{{ else }}global{{ end }}";
    assert_eq!(render_with(template, &[("name", "x")]), "named");
    assert_eq!(render_with(template, &[("name", "")]), "global");
}

#[rstest]
#[case::unknown_field("{{ .B.Tenant }}")]
#[case::unknown_function("{{ upper .B.Group }}")]
#[case::wrong_arity("{{ contains .B.Group }}")]
#[case::unterminated_action("{{ .B.Group ")]
#[case::unterminated_string("{{ lastPart .P.Name \"-- }}")]
#[case::missing_end("{{ if .P.Name }}x")]
#[case::stray_end("x{{ end }}")]
#[case::stray_else("{{ else }}")]
#[case::deep_path("{{ .B.Group.Name }}")]
#[case::empty_action("{{ }}")]
#[case::empty_text("")]
fn test_compile_errors(#[case] template: &str) {
    assert!(Template::compile(template).is_err());
}

#[test]
fn test_compile_error_details() {
    match Template::compile("{{ .B.Tenant }}").unwrap_err() {
        TemplateError::UnknownField { field, .. } => assert_eq!(field, "Tenant"),
        other => panic!("unexpected error: {other}"),
    }

    match Template::compile("{{ lastPart .P.Name }}").unwrap_err() {
        TemplateError::Arity {
            name,
            expected,
            got,
            ..
        } => {
            assert_eq!(name, "lastPart");
            assert_eq!(expected, 2);
            assert_eq!(got, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_group_prefix_boundary() {
    let matcher = Matcher::new(
        "{{.B.Environment}}--{{.B.Group}}--",
        "{{.P.Namespace}}/{{.P.Name}}",
    )
    .unwrap();
    let b = BusinessContext::new("test", "eni", "", vec![]);

    let ctx = CompareCtxInfo::new(&b, [("namespace", "test--eni--hyper"), ("name", "x")]);
    assert!(matcher.matches(MatchType::Prefix, &ctx).unwrap());

    let ctx = CompareCtxInfo::new(&b, [("namespace", "test--en--hyper"), ("name", "x")]);
    assert!(!matcher.matches(MatchType::Prefix, &ctx).unwrap());
}

#[test]
fn test_equal_match_ignores_case() {
    let matcher = Matcher::new("{{ .B.Group }}", "{{ .P.Name }}").unwrap();
    let b = business();

    let ctx = CompareCtxInfo::new(&b, [("name", "ENI")]);
    assert!(matcher.full_match(&ctx).unwrap());
    assert!(!matcher.starts_with(&ctx).unwrap());
}

#[test]
fn test_empty_render_fails_comparison() {
    let matcher = Matcher::new("{{ .B.Team }}", "{{ .P.Name }}").unwrap();
    let b = BusinessContext::new("test", "eni", "", vec![]);
    let ctx = CompareCtxInfo::new(&b, [("name", "x")]);

    let err = matcher.matches(MatchType::Equal, &ctx).unwrap_err();
    assert_eq!(err.to_string(), "Access to requested resource not allowed");
}

#[test]
fn test_template_display_is_source() {
    let source = "{{ .B.Environment }}--";
    assert_eq!(Template::compile(source).unwrap().to_string(), source);
}
