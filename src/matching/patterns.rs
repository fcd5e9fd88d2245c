//! Keyword compilation.

use super::scanner::{self, MatchResult};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// Upper bound on the compiled size of a single keyword matcher (bytes).
pub const DEFAULT_SIZE_LIMIT: usize = 1 << 20;

/// A keyword and its compiled matcher.
///
/// Identity is the raw keyword text. Matching ignores case.
#[derive(Debug, Clone)]
pub struct Keyword {
    raw: String,
    matcher: Regex,
}

impl Keyword {
    /// Compiles a keyword into a whole-word, case-insensitive matcher.
    ///
    /// Regex metacharacters in the keyword are matched literally.
    pub fn compile(raw: &str) -> Result<Self, regex::Error> {
        Self::compile_with_limit(raw, DEFAULT_SIZE_LIMIT)
    }

    fn compile_with_limit(raw: &str, size_limit: usize) -> Result<Self, regex::Error> {
        let pattern = format!(r"\b{}\b", regex::escape(raw));
        let matcher = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .size_limit(size_limit)
            .build()?;
        Ok(Self {
            raw: raw.to_string(),
            matcher,
        })
    }

    /// Returns the keyword as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Counts non-overlapping whole-word occurrences in `text`.
    #[must_use]
    pub fn count_in(&self, text: &str) -> usize {
        self.matcher.find_iter(text).count()
    }
}

impl PartialEq for Keyword {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Keyword {}

/// The compiled keyword list, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    keywords: Vec<Keyword>,
}

impl PatternSet {
    /// Compiles a keyword list.
    ///
    /// Entries are trimmed and blank entries skipped. A repeated keyword is
    /// compiled once. A keyword that fails to compile is dropped with a
    /// warning; the rest of the set is unaffected.
    pub fn compile<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::compile_with_size_limit(keywords, DEFAULT_SIZE_LIMIT)
    }

    /// Like [`PatternSet::compile`] with a custom per-keyword size limit.
    pub fn compile_with_size_limit<I, S>(keywords: I, size_limit: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut compiled = Vec::new();

        for entry in keywords {
            let raw = entry.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            if !seen.insert(raw.to_string()) {
                tracing::debug!(keyword = raw, "Skipping repeated keyword");
                continue;
            }
            match Keyword::compile_with_limit(raw, size_limit) {
                Ok(keyword) => compiled.push(keyword),
                Err(e) => {
                    tracing::warn!(keyword = raw, error = %e, "Dropping keyword that failed to compile");
                },
            }
        }

        Self { keywords: compiled }
    }

    /// Returns the compiled keywords in encounter order.
    #[must_use]
    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    /// Returns the number of compiled keywords.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Returns true if no keyword compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Scans a message body. See [`scanner::scan`].
    #[must_use]
    pub fn scan(&self, body: &str) -> MatchResult {
        scanner::scan(Some(body), self)
    }
}

/// Counts whole-word, case-insensitive occurrences of `keyword` in `text`.
///
/// Returns 0 for a keyword that cannot be compiled.
#[must_use]
pub fn count_occurrences(keyword: &str, text: &str) -> usize {
    Keyword::compile(keyword).map_or(0, |k| k.count_in(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_word_only() {
        assert_eq!(count_occurrences("cat", "category"), 0);
        assert_eq!(count_occurrences("cat", "Cat!"), 1);
        assert_eq!(count_occurrences("cat", "the cat sat"), 1);
        assert_eq!(count_occurrences("cat", "cat, CAT and cAt"), 3);
    }

    #[test]
    fn test_metacharacters_are_literal() {
        assert_eq!(count_occurrences("a.b", "axb a.b"), 1);
        assert_eq!(count_occurrences("u(s)", "u(s) us"), 0);
        assert_eq!(count_occurrences("x+y", "x+y xxy"), 1);
    }

    #[test]
    fn test_non_latin_case_folding() {
        assert_eq!(count_occurrences("скидка", "СКИДКА сегодня, скидка завтра"), 2);
    }

    #[test]
    fn test_compile_trims_and_skips_blank_entries() {
        let set = PatternSet::compile(["  urgent ", "", "   ", "sale"]);
        let names: Vec<&str> = set.keywords().iter().map(Keyword::as_str).collect();
        assert_eq!(names, vec!["urgent", "sale"]);
    }

    #[test]
    fn test_compile_keeps_first_of_repeated_keywords() {
        let set = PatternSet::compile(["sale", "Sale", "sale"]);
        let names: Vec<&str> = set.keywords().iter().map(Keyword::as_str).collect();
        // identity is case-sensitive, so "Sale" is its own keyword
        assert_eq!(names, vec!["sale", "Sale"]);
    }

    #[test]
    fn test_uncompilable_keyword_is_dropped_alone() {
        let long = "x".repeat(10_000);
        let set = PatternSet::compile_with_size_limit(["ok", long.as_str()], 4096);
        assert_eq!(set.len(), 1);
        assert_eq!(set.keywords()[0].as_str(), "ok");
    }
}
