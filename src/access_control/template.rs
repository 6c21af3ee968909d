//! Path templates
//!
//! A deliberately small template language for describing resource paths:
//!
//! ```text
//! {{ .B.Environment }}--{{ .B.Group }}--          business context fields
//! {{ .P.Namespace }}/{{ .P.Name }}                path parameters (Title-cased keys)
//! {{ lastPart .P.Name "--" }}                     helper call
//! {{ if contains .P.Name "--" }}--x{{ else }}y{{ end }}
//! {{- .B.Team -}}                                 trim surrounding whitespace
//! ```
//!
//! Helpers: `contains(s, substr) bool`, `split(s, sep) list`,
//! `lastPart(s, sep) string`. Calls nest with parentheses.
//!
//! Templates are compiled once; every structural problem (unknown field,
//! unknown function, wrong arity, unbalanced `if`/`end`) is a
//! [`TemplateError`] at compile time, so rendering cannot fail.

use crate::access_control::matcher::CompareCtxInfo;
use crate::error::TemplateError;
use std::borrow::Cow;
use std::fmt;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A compiled template
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Action(Expr),
    If {
        cond: Expr,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Field(Field),
    Param(String),
    Literal(String),
    Call { func: Func, args: Vec<Expr> },
}

/// Fields of the business context addressable as `.B.<Field>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Environment,
    Group,
    Team,
    Scopes,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "Environment" => Some(Field::Environment),
            "Group" => Some(Field::Group),
            "Team" => Some(Field::Team),
            "Scopes" => Some(Field::Scopes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Contains,
    Split,
    LastPart,
}

impl Func {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "contains" => Some(Func::Contains),
            "split" => Some(Func::Split),
            "lastPart" => Some(Func::LastPart),
            _ => None,
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Func::Contains => "contains",
            Func::Split => "split",
            Func::LastPart => "lastPart",
        }
    }

    const fn arity(&self) -> usize {
        2
    }
}

impl Template {
    /// Compile template text
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        if source.trim().is_empty() {
            return Err(TemplateError::Empty);
        }
        let nodes = Parser::new(source).parse()?;
        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    /// Original template text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render into `out`, appending
    pub fn render_into(&self, ctx: &CompareCtxInfo<'_>, out: &mut String) {
        render_nodes(&self.nodes, ctx, out);
    }

    /// Render into a fresh string
    pub fn render(&self, ctx: &CompareCtxInfo<'_>) -> String {
        let mut out = String::with_capacity(self.source.len());
        self.render_into(ctx, &mut out);
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

enum Value<'a> {
    Text(Cow<'a, str>),
    Bool(bool),
    List(Vec<String>),
}

impl<'a> Value<'a> {
    fn truthy(&self) -> bool {
        match self {
            Value::Text(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
        }
    }

    fn into_text(self) -> Cow<'a, str> {
        match self {
            Value::Text(s) => s,
            Value::Bool(b) => Cow::Borrowed(if b { "true" } else { "false" }),
            Value::List(items) => Cow::Owned(format!("[{}]", items.join(" "))),
        }
    }

    fn write_to(self, out: &mut String) {
        match self {
            Value::Text(s) => out.push_str(&s),
            other => out.push_str(&other.into_text()),
        }
    }
}

fn render_nodes(nodes: &[Node], ctx: &CompareCtxInfo<'_>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(expr) => eval(expr, ctx).write_to(out),
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                if eval(cond, ctx).truthy() {
                    render_nodes(then, ctx, out);
                } else {
                    render_nodes(otherwise, ctx, out);
                }
            }
        }
    }
}

fn eval<'a>(expr: &'a Expr, ctx: &'a CompareCtxInfo<'_>) -> Value<'a> {
    match expr {
        Expr::Field(field) => {
            let b = ctx.business();
            match field {
                Field::Environment => Value::Text(Cow::Borrowed(b.environment())),
                Field::Group => Value::Text(Cow::Borrowed(b.group())),
                Field::Team => Value::Text(Cow::Borrowed(b.team())),
                Field::Scopes => Value::List(b.scopes().to_vec()),
            }
        }
        Expr::Param(key) => Value::Text(Cow::Borrowed(ctx.param(key).unwrap_or_default())),
        Expr::Literal(text) => Value::Text(Cow::Borrowed(text.as_str())),
        Expr::Call { func, args } => {
            let mut args = args.iter().map(|arg| eval(arg, ctx).into_text());
            let s = args.next().unwrap_or_default();
            let sep = args.next().unwrap_or_default();
            match func {
                Func::Contains => Value::Bool(s.contains(sep.as_ref())),
                Func::Split => Value::List(split(&s, &sep)),
                Func::LastPart => Value::Text(Cow::Owned(last_part(&s, &sep).to_string())),
            }
        }
    }
}

fn split(s: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        s.chars().map(String::from).collect()
    } else {
        s.split(sep).map(str::to_string).collect()
    }
}

/// Substring after the final `sep`, or empty when `sep` does not occur
fn last_part<'s>(s: &'s str, sep: &str) -> &'s str {
    if sep.is_empty() {
        return "";
    }
    s.rsplit_once(sep).map(|(_, last)| last).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Param(String),
    Str(String),
    Ident(String),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Field(name) => write!(f, ".B.{}", name),
            Token::Param(name) => write!(f, ".P.{}", name),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Ident(name) => write!(f, "{}", name),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

/// Open `if` block awaiting its `end`
struct Branch {
    cond: Expr,
    then: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl Branch {
    fn current(&mut self) -> &mut Vec<Node> {
        match &mut self.otherwise {
            Some(otherwise) => otherwise,
            None => &mut self.then,
        }
    }
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
    root: Vec<Node>,
    stack: Vec<Branch>,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            root: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Vec<Node>, TemplateError> {
        let src = self.src;
        let mut trim_next = false;

        loop {
            let rest = &src[self.pos..];
            let open = rest.find(OPEN);
            let raw = match open {
                Some(i) => &rest[..i],
                None => rest,
            };
            self.pos += raw.len();

            let mut text = if trim_next { raw.trim_start() } else { raw };

            if open.is_none() {
                self.push_text(text);
                break;
            }

            let action_start = self.pos;
            self.pos += OPEN.len();
            if src[self.pos..].starts_with('-') {
                self.pos += 1;
                text = text.trim_end();
            }
            self.push_text(text);

            let (tokens, trim_right) = self.lex_action(action_start)?;
            trim_next = trim_right;
            self.handle_action(tokens, action_start)?;
        }

        if !self.stack.is_empty() {
            return Err(self.unbalanced("if"));
        }
        Ok(self.root)
    }

    fn target(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(branch) => branch.current(),
            None => &mut self.root,
        }
    }

    fn push_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.target().push(Node::Text(text.to_string()));
        }
    }

    fn handle_action(&mut self, tokens: Vec<Spanned>, offset: usize) -> Result<(), TemplateError> {
        let keyword = match tokens.first() {
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) => Some(name.as_str()),
            Some(_) => None,
            None => return Err(self.unexpected(CLOSE, offset)),
        };

        match keyword {
            Some("if") => {
                if tokens.len() == 1 {
                    return Err(self.unexpected(CLOSE, offset));
                }
                let cond = self.parse_expr(&tokens[1..])?;
                self.stack.push(Branch {
                    cond,
                    then: Vec::new(),
                    otherwise: None,
                });
            }
            Some("else") => {
                self.expect_bare(&tokens)?;
                if !matches!(self.stack.last(), Some(branch) if branch.otherwise.is_none()) {
                    return Err(self.unbalanced("else"));
                }
                if let Some(branch) = self.stack.last_mut() {
                    branch.otherwise = Some(Vec::new());
                }
            }
            Some("end") => {
                self.expect_bare(&tokens)?;
                let branch = self.stack.pop().ok_or_else(|| self.unbalanced("end"))?;
                let node = Node::If {
                    cond: branch.cond,
                    then: branch.then,
                    otherwise: branch.otherwise.unwrap_or_default(),
                };
                self.target().push(node);
            }
            _ => {
                let expr = self.parse_expr(&tokens)?;
                self.target().push(Node::Action(expr));
            }
        }
        Ok(())
    }

    /// `else` and `end` take no operands
    fn expect_bare(&self, tokens: &[Spanned]) -> Result<(), TemplateError> {
        match tokens.get(1) {
            Some(extra) => Err(self.unexpected(&extra.token.to_string(), extra.offset)),
            None => Ok(()),
        }
    }

    fn parse_expr(&self, tokens: &[Spanned]) -> Result<Expr, TemplateError> {
        let (expr, used) = self.parse_command(tokens)?;
        match tokens.get(used) {
            Some(extra) => Err(self.unexpected(&extra.token.to_string(), extra.offset)),
            None => Ok(expr),
        }
    }

    /// A function call with its operands, or a single operand
    fn parse_command(&self, tokens: &[Spanned]) -> Result<(Expr, usize), TemplateError> {
        let Some(first) = tokens.first() else {
            return Err(self.unexpected(CLOSE, self.src.len()));
        };

        let Token::Ident(name) = &first.token else {
            return self.parse_operand(tokens);
        };

        let func = Func::parse(name).ok_or_else(|| TemplateError::UnknownFunction {
            template: self.src.to_string(),
            name: name.clone(),
        })?;

        let mut args = Vec::new();
        let mut i = 1;
        while let Some(next) = tokens.get(i) {
            if next.token == Token::RParen {
                break;
            }
            let (arg, used) = self.parse_operand(&tokens[i..])?;
            args.push(arg);
            i += used;
        }

        if args.len() != func.arity() {
            return Err(TemplateError::Arity {
                template: self.src.to_string(),
                name: func.name().to_string(),
                expected: func.arity(),
                got: args.len(),
            });
        }

        Ok((Expr::Call { func, args }, i))
    }

    fn parse_operand(&self, tokens: &[Spanned]) -> Result<(Expr, usize), TemplateError> {
        let Some(first) = tokens.first() else {
            return Err(self.unexpected(CLOSE, self.src.len()));
        };

        match &first.token {
            Token::Field(name) => {
                let field = Field::parse(name).ok_or_else(|| TemplateError::UnknownField {
                    template: self.src.to_string(),
                    field: name.clone(),
                })?;
                Ok((Expr::Field(field), 1))
            }
            Token::Param(name) => Ok((Expr::Param(name.clone()), 1)),
            Token::Str(text) => Ok((Expr::Literal(text.clone()), 1)),
            Token::LParen => {
                let (inner, used) = self.parse_command(&tokens[1..])?;
                match tokens.get(1 + used) {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => Ok((inner, used + 2)),
                    Some(other) => Err(self.unexpected(&other.token.to_string(), other.offset)),
                    None => Err(self.unbalanced("(")),
                }
            }
            Token::Ident(_) | Token::RParen => {
                Err(self.unexpected(&first.token.to_string(), first.offset))
            }
        }
    }

    /// Tokenize one action, leaving `pos` after its closing delimiter.
    /// Returns whether the action ends with `-}}`.
    fn lex_action(&mut self, start: usize) -> Result<(Vec<Spanned>, bool), TemplateError> {
        let src = self.src;
        let mut tokens = Vec::new();

        loop {
            let rest = &src[self.pos..];
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            let Some(first) = trimmed.chars().next() else {
                return Err(TemplateError::Unterminated {
                    template: src.to_string(),
                    offset: start,
                });
            };
            if trimmed.starts_with("-}}") {
                self.pos += 3;
                return Ok((tokens, true));
            }
            if trimmed.starts_with(CLOSE) {
                self.pos += CLOSE.len();
                return Ok((tokens, false));
            }

            let offset = self.pos;
            let token = match first {
                '(' => {
                    self.pos += 1;
                    Token::LParen
                }
                ')' => {
                    self.pos += 1;
                    Token::RParen
                }
                '"' => self.lex_string(offset)?,
                '.' => self.lex_reference(offset)?,
                c if c.is_ascii_alphabetic() => {
                    let ident = take_ident(trimmed);
                    self.pos += ident.len();
                    Token::Ident(ident.to_string())
                }
                c => return Err(self.unexpected(&c.to_string(), offset)),
            };
            tokens.push(Spanned { token, offset });
        }
    }

    /// `.B.<Ident>` or `.P.<Ident>`; deeper paths are rejected
    fn lex_reference(&mut self, offset: usize) -> Result<Token, TemplateError> {
        let src = self.src;
        let rest = &src[self.pos..];
        let (kind, after) = if let Some(after) = rest.strip_prefix(".B.") {
            ('B', after)
        } else if let Some(after) = rest.strip_prefix(".P.") {
            ('P', after)
        } else {
            let word = rest.split_whitespace().next().unwrap_or(rest);
            return Err(self.unexpected(word, offset));
        };

        let ident = take_ident(after);
        if ident.is_empty() || after[ident.len()..].starts_with('.') {
            let word = rest.split_whitespace().next().unwrap_or(rest);
            return Err(self.unexpected(word, offset));
        }
        self.pos += 3 + ident.len();

        Ok(match kind {
            'B' => Token::Field(ident.to_string()),
            _ => Token::Param(ident.to_string()),
        })
    }

    fn lex_string(&mut self, offset: usize) -> Result<Token, TemplateError> {
        let src = self.src;
        let mut value = String::new();
        let mut chars = src[self.pos + 1..].char_indices();

        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += 1 + i + 1;
                    return Ok(Token::Str(value));
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                _ => value.push(c),
            }
        }

        Err(TemplateError::Unterminated {
            template: self.src.to_string(),
            offset,
        })
    }

    fn unexpected(&self, token: &str, offset: usize) -> TemplateError {
        TemplateError::Unexpected {
            template: self.src.to_string(),
            token: token.to_string(),
            offset,
        }
    }

    fn unbalanced(&self, keyword: &str) -> TemplateError {
        TemplateError::Unbalanced {
            template: self.src.to_string(),
            keyword: keyword.to_string(),
        }
    }
}

fn take_ident(s: &str) -> &str {
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::context::BusinessContext;

    fn business() -> BusinessContext {
        BusinessContext::new(
            "test",
            "eni",
            "hyperion",
            vec!["team:read".to_string(), "group:all".to_string()],
        )
    }

    fn render(source: &str, params: &[(&str, &str)]) -> String {
        let b = business();
        let ctx = CompareCtxInfo::new(&b, params.iter().copied());
        Template::compile(source).unwrap().render(&ctx)
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(render("static/path", &[]), "static/path");
    }

    #[test]
    fn test_business_fields() {
        assert_eq!(
            render("{{ .B.Environment }}--{{ .B.Group }}--{{ .B.Team }}/", &[]),
            "test--eni--hyperion/"
        );
        assert_eq!(render("{{.B.Environment}}", &[]), "test");
    }

    #[test]
    fn test_scopes_render_as_list() {
        assert_eq!(render("{{ .B.Scopes }}", &[]), "[team:read group:all]");
    }

    #[test]
    fn test_path_params() {
        assert_eq!(
            render(
                "{{ .P.Namespace }}/{{ .P.Name }}",
                &[("namespace", "test--eni--hyperion"), ("name", "foo-app")]
            ),
            "test--eni--hyperion/foo-app"
        );
    }

    #[test]
    fn test_missing_param_renders_empty() {
        assert_eq!(render("{{ .P.Namespace }}/x", &[]), "/x");
    }

    #[test]
    fn test_contains_conditional() {
        let source =
            r#"{{ .B.Environment }}/{{ .B.Group }}{{ if contains .P.Name "--" }}--{{ lastPart .P.Name "--" }}{{ end }}"#;
        assert_eq!(render(source, &[("name", "eni--foo")]), "test/eni--foo");
        assert_eq!(render(source, &[("name", "eni")]), "test/eni");
    }

    #[test]
    fn test_else_branch() {
        let source = r#"{{ if contains .P.Name "--" }}team{{ else }}group{{ end }}"#;
        assert_eq!(render(source, &[("name", "a--b")]), "team");
        assert_eq!(render(source, &[("name", "ab")]), "group");
    }

    #[test]
    fn test_nested_if() {
        let source = r#"{{ if .P.Name }}{{ if contains .P.Name "x" }}x{{ else }}n{{ end }}{{ end }}"#;
        assert_eq!(render(source, &[("name", "box")]), "x");
        assert_eq!(render(source, &[("name", "bin")]), "n");
        assert_eq!(render(source, &[("name", "")]), "");
    }

    #[test]
    fn test_split_and_parenthesized_call() {
        assert_eq!(render(r#"{{ split "a--b--c" "--" }}"#, &[]), "[a b c]");
        assert_eq!(
            render(r#"{{ lastPart (lastPart .P.Name "/") "--" }}"#, &[("name", "x/eni--team")]),
            "team"
        );
    }

    #[test]
    fn test_last_part_without_separator_is_empty() {
        assert_eq!(last_part("abc", "--"), "");
        assert_eq!(last_part("a--b--c", "--"), "c");
        assert_eq!(last_part("a--", "--"), "");
    }

    #[test]
    fn test_trim_markers() {
        assert_eq!(render("a  {{- .B.Group -}}  b", &[]), "aenib");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(render(r#"{{ "a\"b" }}"#, &[]), "a\"b");
        assert_eq!(render(r#"{{ "}}" }}"#, &[]), "}}");
    }

    #[test]
    fn test_empty_template_rejected() {
        assert_eq!(Template::compile("").unwrap_err(), TemplateError::Empty);
        assert_eq!(Template::compile("   ").unwrap_err(), TemplateError::Empty);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Template::compile("{{ .B.Tenant }}").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownField { ref field, .. } if field == "Tenant"));
    }

    #[test]
    fn test_unknown_function_rejected() {
        let err = Template::compile("{{ upper .B.Team }}").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownFunction { ref name, .. } if name == "upper"));
    }

    #[test]
    fn test_arity_checked() {
        let err = Template::compile(r#"{{ contains .P.Name }}"#).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::Arity {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_unterminated_action() {
        let err = Template::compile("{{ .B.Team ").unwrap_err();
        assert!(matches!(err, TemplateError::Unterminated { offset: 0, .. }));

        let err = Template::compile(r#"{{ "open }}"#).unwrap_err();
        assert!(matches!(err, TemplateError::Unterminated { .. }));
    }

    #[test]
    fn test_unbalanced_blocks() {
        assert!(matches!(
            Template::compile(r#"{{ if .P.Name }}x"#).unwrap_err(),
            TemplateError::Unbalanced { ref keyword, .. } if keyword == "if"
        ));
        assert!(matches!(
            Template::compile("x{{ end }}").unwrap_err(),
            TemplateError::Unbalanced { ref keyword, .. } if keyword == "end"
        ));
        assert!(matches!(
            Template::compile("{{ if .P.Name }}a{{ else }}b{{ else }}c{{ end }}").unwrap_err(),
            TemplateError::Unbalanced { ref keyword, .. } if keyword == "else"
        ));
    }

    #[test]
    fn test_nested_reference_rejected() {
        let err = Template::compile("{{ .B.Group.Name }}").unwrap_err();
        assert!(matches!(err, TemplateError::Unexpected { .. }));

        let err = Template::compile("{{ .Group }}").unwrap_err();
        assert!(matches!(err, TemplateError::Unexpected { offset: 3, .. }));
    }

    #[test]
    fn test_empty_action_rejected() {
        assert!(matches!(
            Template::compile("{{ }}").unwrap_err(),
            TemplateError::Unexpected { .. }
        ));
    }

    #[test]
    fn test_trailing_operand_rejected() {
        let err = Template::compile("{{ .B.Team .B.Group }}").unwrap_err();
        assert!(matches!(err, TemplateError::Unexpected { ref token, .. } if token == ".B.Group"));
    }
}
