//! Keyword matching against post text

use regex::RegexBuilder;

/// Compiled criterion term.
///
/// Terms are case-insensitive regular expressions with substring search
/// semantics: a post matches if the pattern is found anywhere in its text.
/// Invalid patterns are rejected at criterion-save time, so a collection
/// cycle normally never sees one.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: regex::Regex,
}

impl Matcher {
    pub fn new(term: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(term).case_insensitive(true).build()?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    pub fn term(&self) -> &str {
        self.pattern.as_str()
    }
}
