use crate::error::{HaError, Result};
use regex::Regex;

/// Caches whose explicit invalidations are always forwarded.
pub const DEFAULT_CACHE_PATTERNS: &[&str] = &[
    "^accounts.*",
    "^groups.*",
    "ldap_groups",
    "ldap_usernames",
    "oauth_tokens",
    "^project.*",
    "sshkeys",
    "web_sessions",
];

/// Allow-list of names (cache names, event types).
///
/// A pattern starting with `^` is a regular expression; anything else is a
/// glob where `*` matches any run of characters and `?` exactly one.
/// Every pattern must match the whole name.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    patterns: Vec<String>,
    compiled: Option<Regex>,
    match_all_when_empty: bool,
}

impl PatternMatcher {
    /// Matcher that accepts nothing unless a pattern matches.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        Self::build(patterns, false)
    }

    /// Matcher that accepts everything when no pattern is configured.
    pub fn allow_all_when_empty<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        Self::build(patterns, true)
    }

    /// Default cache allow-list extended with `extra`.
    pub fn for_caches<S: AsRef<str>>(extra: &[S]) -> Result<Self> {
        let mut all: Vec<String> = DEFAULT_CACHE_PATTERNS.iter().map(|p| p.to_string()).collect();
        all.extend(extra.iter().map(|p| p.as_ref().to_string()));
        Self::build(&all, false)
    }

    fn build<S: AsRef<str>>(patterns: &[S], match_all_when_empty: bool) -> Result<Self> {
        let patterns: Vec<String> = patterns
            .iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let compiled = if patterns.is_empty() {
            None
        } else {
            let alternation = patterns
                .iter()
                .map(|p| format!("(?:{})", to_regex(p)))
                .collect::<Vec<_>>()
                .join("|");
            let regex = Regex::new(&format!("^(?:{})$", alternation)).map_err(|e| {
                HaError::Config(format!("Invalid pattern in {:?}: {}", patterns, e))
            })?;
            Some(regex)
        };

        Ok(PatternMatcher {
            patterns,
            compiled,
            match_all_when_empty,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.compiled {
            Some(regex) => regex.is_match(name),
            None => self.match_all_when_empty,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn to_regex(pattern: &str) -> String {
    if let Some(rest) = pattern.strip_prefix('^') {
        return rest.strip_suffix('$').unwrap_or(rest).to_string();
    }

    let mut out = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out
}
