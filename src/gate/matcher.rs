use anyhow::{Context, Result};
use regex::Regex;

/// Prefix that turns a pattern into a regular expression.
pub const REGEX_PREFIX: &str = "re:";

/// One line pattern. Plain strings match as substrings; `re:<expr>` matches
/// as a regex anywhere in the line.
#[derive(Debug, Clone)]
pub enum LinePattern {
    Substring(String),
    Regex(Regex),
}

impl LinePattern {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.strip_prefix(REGEX_PREFIX) {
            Some(expr) => {
                let re = Regex::new(expr)
                    .with_context(|| format!("invalid regex line pattern '{}'", raw))?;
                Ok(LinePattern::Regex(re))
            }
            None => Ok(LinePattern::Substring(raw.to_string())),
        }
    }

    pub fn matches(&self, line: &str) -> bool {
        match self {
            LinePattern::Substring(s) => line.contains(s.as_str()),
            LinePattern::Regex(re) => re.is_match(line),
        }
    }
}

/// Ordered set of line patterns; an empty set matches nothing.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<LinePattern>,
}

impl PatternSet {
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        let patterns = raw
            .iter()
            .map(|p| LinePattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches_any(&self, line: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(line))
    }
}
