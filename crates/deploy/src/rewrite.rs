//! CDN-path substitution applied to text assets before upload.

use std::borrow::Cow;

use cdnpush_transfer::is_rewritable;
use regex::{Regex, RegexBuilder};

use crate::error::DeployError;

/// Source side of a [`ReplacementRule`].
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Compiled as a global, case-insensitive regular expression.
    Text(String),
    /// Used verbatim.
    Regex(Regex),
}

impl Pattern {
    fn compile(self) -> Result<Regex, regex::Error> {
        match self {
            Pattern::Text(source) => RegexBuilder::new(&source).case_insensitive(true).build(),
            Pattern::Regex(re) => Ok(re),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::Text(s.to_string())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Pattern::Text(s)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

/// Replaces every match of `from` with `to`.
///
/// `to` follows `regex` replacement syntax, so `$1` refers to a capture group.
#[derive(Debug, Clone)]
pub struct ReplacementRule {
    from: Regex,
    to: String,
}

impl ReplacementRule {
    pub fn new(from: impl Into<Pattern>, to: impl Into<String>) -> Result<Self, DeployError> {
        Ok(Self {
            from: from.into().compile()?,
            to: to.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.from.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.to
    }

    fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.from.replace_all(text, self.to.as_str())
    }
}

/// Applies `rules` one after another. Each rule sees the output of the
/// previous one.
pub fn apply_rules(text: &str, rules: &[ReplacementRule]) -> String {
    rules
        .iter()
        .fold(text.to_string(), |acc, rule| rule.apply(&acc).into_owned())
}

/// Returns the content to upload for `stripped`.
///
/// Style, script, markup and template files are decoded (lossy UTF-8) and
/// rewritten; everything else is passed through untouched. `rules` of
/// `None` means no rule list was configured at all, which is an error as
/// soon as a rewritable file shows up.
pub fn rewrite_content(
    stripped: &str,
    content: &[u8],
    rules: Option<&[ReplacementRule]>,
) -> Result<Vec<u8>, DeployError> {
    if !is_rewritable(stripped) {
        return Ok(content.to_vec());
    }
    let rules = rules.ok_or_else(|| DeployError::ReplacementRulesMissing {
        file: stripped.to_string(),
    })?;
    let text = String::from_utf8_lossy(content);
    Ok(apply_rules(&text, rules).into_bytes())
}
