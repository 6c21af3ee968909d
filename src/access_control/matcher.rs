//! Template matching
//!
//! Renders an expected/user-input template pair against a
//! [`CompareCtxInfo`] and compares the results by prefix or by
//! case-insensitive equality.

use crate::access_control::context::BusinessContext;
use crate::access_control::template::Template;
use crate::access_control::types::MatchType;
use crate::error::{AuthorizationError, TemplateError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// Idle render buffers kept for reuse
const MAX_IDLE_BUFFERS: usize = 64;

/// Buffers that grew beyond this are dropped instead of pooled
const MAX_POOLED_CAPACITY: usize = 4 * 1024;

static RENDER_BUFFERS: BufferPool = BufferPool::new(MAX_IDLE_BUFFERS);

/// Render inputs: the business context (`.B`) and path parameters (`.P`)
///
/// Parameter keys are Title-cased on construction, so a route parameter
/// `namespace` is addressed as `.P.Namespace`.
#[derive(Debug, Clone)]
pub struct CompareCtxInfo<'a> {
    b: &'a BusinessContext,
    p: HashMap<String, String>,
}

impl<'a> CompareCtxInfo<'a> {
    pub fn new<K, V>(b: &'a BusinessContext, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let p = params
            .into_iter()
            .map(|(k, v)| (title_case(k.as_ref()), v.as_ref().to_string()))
            .collect();
        Self { b, p }
    }

    pub fn business(&self) -> &'a BusinessContext {
        self.b
    }

    /// Parameter by its Title-cased key
    pub fn param(&self, key: &str) -> Option<&str> {
        self.p.get(key).map(String::as_str)
    }
}

/// Title-case every word of `key`: first letter upper, the rest lower.
///
/// Letters, digits and `_` form words; anything else separates them.
pub fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut at_word_start = true;

    for c in key.chars() {
        if c.is_alphanumeric() || c == '_' {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// A compiled expected/user-input template pair
#[derive(Debug, Clone)]
pub struct Matcher {
    expected: Template,
    user_input: Template,
}

impl Matcher {
    pub fn new(expected_template: &str, user_input_template: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            expected: Template::compile(expected_template)?,
            user_input: Template::compile(user_input_template)?,
        })
    }

    pub fn expected_template(&self) -> &Template {
        &self.expected
    }

    pub fn user_input_template(&self) -> &Template {
        &self.user_input
    }

    /// Render both templates, expected first.
    ///
    /// Allocates fresh strings on every call; comparisons go through
    /// [`Matcher::matches`], which renders into pooled buffers instead.
    pub fn to_strings(&self, ctx: &CompareCtxInfo<'_>) -> (String, String) {
        (self.expected.render(ctx), self.user_input.render(ctx))
    }

    /// Render only the expected template into a fresh string
    pub fn expected_string(&self, ctx: &CompareCtxInfo<'_>) -> String {
        self.expected.render(ctx)
    }

    /// True iff the rendered user input starts with the rendered expected string
    pub fn starts_with(&self, ctx: &CompareCtxInfo<'_>) -> Result<bool, AuthorizationError> {
        self.matches(MatchType::Prefix, ctx)
    }

    /// True iff both rendered strings are equal, ignoring case
    pub fn full_match(&self, ctx: &CompareCtxInfo<'_>) -> Result<bool, AuthorizationError> {
        self.matches(MatchType::Equal, ctx)
    }

    /// Compare using `match_type`, rendering into pooled buffers
    pub fn matches(
        &self,
        match_type: MatchType,
        ctx: &CompareCtxInfo<'_>,
    ) -> Result<bool, AuthorizationError> {
        let mut expected = RENDER_BUFFERS.acquire();
        self.expected.render_into(ctx, &mut expected);
        self.matches_expected(&expected, match_type, ctx)
    }

    /// Compare the rendered user input against an expected string computed elsewhere
    pub fn matches_expected(
        &self,
        expected: &str,
        match_type: MatchType,
        ctx: &CompareCtxInfo<'_>,
    ) -> Result<bool, AuthorizationError> {
        let mut actual = RENDER_BUFFERS.acquire();
        self.user_input.render_into(ctx, &mut actual);
        compare(match_type, expected, &actual)
    }
}

/// Compile and render a one-off template
pub fn render(template: &str, ctx: &CompareCtxInfo<'_>) -> Result<String, TemplateError> {
    Ok(Template::compile(template)?.render(ctx))
}

/// Compare an expected and an actual string.
///
/// Either side rendering empty is an evaluation failure, not a mismatch.
pub fn compare(
    match_type: MatchType,
    expected: &str,
    actual: &str,
) -> Result<bool, AuthorizationError> {
    if expected.is_empty() {
        return Err(AuthorizationError::new("expected is empty"));
    }
    if actual.is_empty() {
        return Err(AuthorizationError::new("actual is empty"));
    }

    Ok(match match_type {
        MatchType::Prefix => actual.starts_with(expected),
        MatchType::Equal => equal_fold(expected, actual),
    })
}

fn equal_fold(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Bounded pool of reusable render buffers
///
/// A buffer is owned by exactly one [`PooledBuffer`] at a time and goes back
/// to the pool, cleared, when that guard drops.
pub struct BufferPool {
    idle: Mutex<Vec<String>>,
    max_idle: usize,
}

impl BufferPool {
    pub const fn new(max_idle: usize) -> Self {
        Self {
            idle: parking_lot::const_mutex(Vec::new()),
            max_idle,
        }
    }

    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self.idle.lock().pop().unwrap_or_default();
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    /// Number of idle buffers
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, mut buf: String) {
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        buf.clear();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

/// Buffer borrowed from a [`BufferPool`]
pub struct PooledBuffer<'p> {
    pool: &'p BufferPool,
    buf: Option<String>,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        self.buf.as_ref().unwrap_or(&EMPTY)
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        self.buf.get_or_insert_with(String::new)
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

static EMPTY: String = String::new();
