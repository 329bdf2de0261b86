//! Request path matching for route rules.

use regex::Regex;
use std::fmt;

/// How a route rule decides whether it accepts a request path.
///
/// Paths are compared raw, exactly as the transport hands them over:
/// no decoding, no trailing-slash folding, no `..` collapsing.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Literal string equality.
    Exact(String),
    /// Regular expression tested against the whole raw path.
    Pattern(Regex),
}

impl Matcher {
    pub fn exact(path: impl Into<String>) -> Self {
        Matcher::Exact(path.into())
    }

    /// Compile a pattern matcher.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Matcher::Pattern(Regex::new(pattern)?))
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Matcher::Exact(_))
    }

    /// Check whether this matcher accepts `path`.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::Exact(expected) => expected == path,
            Matcher::Pattern(regex) => regex.is_match(path),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact(path) => write!(f, "{}", path),
            Matcher::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}
