//! Subscription patterns: exact names, regular expressions, or everything.

use std::fmt;

use regex::Regex;

/// Which event names a subscription receives.
///
/// - `&str`/`String` convert to [`Pattern::Exact`].
/// - [`Pattern::regex`] compiles an unanchored expression; `".*"` becomes [`Pattern::Any`].
#[derive(Clone)]
pub enum Pattern {
    /// Every event.
    Any,
    /// Exactly this name.
    Exact(String),
    /// Names the expression finds a match in.
    Regex(Regex),
}

impl Pattern {
    /// Compiles `expr` into a pattern.
    pub fn regex(expr: &str) -> Result<Self, regex::Error> {
        if expr == ".*" {
            return Ok(Pattern::Any);
        }
        Regex::new(expr).map(Pattern::Regex)
    }

    /// Returns true if `name` is selected by this pattern.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Exact(exact) => exact == name,
            Pattern::Regex(re) => re.is_match(name),
        }
    }
}

impl From<&str> for Pattern {
    fn from(name: &str) -> Self {
        Pattern::Exact(name.to_string())
    }
}

impl From<String> for Pattern {
    fn from(name: String) -> Self {
        Pattern::Exact(name)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Any => f.write_str("Any"),
            Pattern::Exact(s) => write!(f, "Exact({s:?})"),
            Pattern::Regex(re) => write!(f, "Regex({:?})", re.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_everything() {
        let p = Pattern::regex(".*").unwrap();
        assert!(matches!(p, Pattern::Any));
        assert!(p.matches("orderPlaced"));
        assert!(p.matches(""));
    }

    #[test]
    fn exact_is_exact() {
        let p = Pattern::from("orderPlaced");
        assert!(p.matches("orderPlaced"));
        assert!(!p.matches("orderPlacedLate"));
    }

    #[test]
    fn regex_is_unanchored() {
        let p = Pattern::regex("^order").unwrap();
        assert!(p.matches("orderShipped"));
        assert!(!p.matches("reorder"));

        let q = Pattern::regex("Placed").unwrap();
        assert!(q.matches("orderPlaced"));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(Pattern::regex("(").is_err());
    }
}
