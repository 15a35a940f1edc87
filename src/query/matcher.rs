//! Whole-word keyword matching against titles.

use regex::{Regex, RegexBuilder};

use super::{QueryError, QueryResult};

/// Case-insensitive whole-word matcher for a single keyword.
///
/// A match must start and end on a word boundary, where word characters are
/// ASCII letters, digits and underscore. "net" therefore matches
/// "Net" and "net-work" but not "internet". Non-ASCII letters count as
/// separators, so "dinger" matches inside "schrödinger".
#[derive(Debug, Clone)]
pub struct WordMatcher {
    pattern: Regex,
}

impl WordMatcher {
    /// Compile a matcher for `keyword`. The keyword is matched literally.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidQuery` if the pattern exceeds the regex
    /// engine's size limits
    pub fn new(keyword: &str) -> QueryResult<Self> {
        let source = format!(r"(?-u:\b)({})(?-u:\b)", regex::escape(keyword));
        let pattern = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| QueryError::InvalidQuery(format!("keyword '{}': {}", keyword, e)))?;
        Ok(Self { pattern })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(keyword: &str, text: &str) -> bool {
        WordMatcher::new(keyword).unwrap().is_match(text)
    }

    #[test]
    fn test_whole_word_only() {
        assert!(!matches("net", "internet of things"));
        assert!(matches("internet", "internet of things"));
        assert!(matches("net", "a net for fish"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches("net", "Net Surgery"));
        assert!(matches("GAN", "conditional gan training"));
    }

    #[test]
    fn test_punctuation_is_a_boundary() {
        assert!(matches("net", "net-work"));
        assert!(matches("3d", "(3d) reconstruction"));
        assert!(!matches("net", "net_work"));
        assert!(!matches("net", "net2"));
    }

    #[test]
    fn test_keyword_is_literal() {
        assert!(matches("a.c", "the a.c circuit"));
        assert!(!matches("a.c", "abc"));
        // "+" is not a word character, so there is no boundary after "c++ "
        assert!(!matches("c++", "why c++ is hard"));
    }

    #[test]
    fn test_non_ascii_letters_are_boundaries() {
        assert!(matches("dinger", "schrödinger bridges"));
        assert!(matches("net", "énet"));
        assert!(matches("schr", "Schrödinger equation"));
        assert!(!matches("bridge", "schrödinger bridges"));
    }

    #[test]
    fn test_multi_word_keyword() {
        assert!(matches("light field", "dense light field imaging"));
        assert!(!matches("light field", "light fields"));
    }
}
