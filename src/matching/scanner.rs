//! Per-message scanning.

use super::patterns::PatternSet;
use std::collections::BTreeMap;

/// Occurrences of one keyword in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    /// The keyword as configured.
    pub keyword: String,
    /// Number of whole-word occurrences, always at least 1.
    pub count: usize,
}

/// Keywords found in one message, in keyword encounter order.
///
/// Empty means no match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    matches: Vec<KeywordMatch>,
}

impl MatchResult {
    /// Returns true if no keyword matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Number of distinct keywords that matched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Iterates over matches in encounter order.
    pub fn iter(&self) -> impl Iterator<Item = &KeywordMatch> {
        self.matches.iter()
    }

    /// Returns the count for a keyword, if it matched.
    #[must_use]
    pub fn count_of(&self, keyword: &str) -> Option<usize> {
        self.matches
            .iter()
            .find(|m| m.keyword == keyword)
            .map(|m| m.count)
    }

    /// Returns the matches keyed by keyword, ignoring order.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, usize> {
        self.matches
            .iter()
            .map(|m| (m.keyword.clone(), m.count))
            .collect()
    }

    /// Renders `keyword` or `keyword (count)` entries joined with `", "`.
    #[must_use]
    pub fn summary(&self) -> String {
        self.matches
            .iter()
            .map(|m| {
                if m.count > 1 {
                    format!("{} ({})", m.keyword, m.count)
                } else {
                    m.keyword.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a> IntoIterator for &'a MatchResult {
    type Item = &'a KeywordMatch;
    type IntoIter = std::slice::Iter<'a, KeywordMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// Counts every keyword in `body`, omitting keywords that do not occur.
///
/// A missing body scans as empty.
#[must_use]
pub fn scan(body: Option<&str>, patterns: &PatternSet) -> MatchResult {
    let Some(body) = body.filter(|b| !b.is_empty()) else {
        return MatchResult::default();
    };

    let matches = patterns
        .keywords()
        .iter()
        .filter_map(|keyword| {
            let count = keyword.count_in(body);
            (count > 0).then(|| KeywordMatch {
                keyword: keyword.as_str().to_string(),
                count,
            })
        })
        .collect();

    MatchResult { matches }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_counts_in_keyword_order() {
        let set = PatternSet::compile(["sale", "urgent"]);
        let result = scan(Some("URGENT: sale, sale, sale"), &set);

        let entries: Vec<(&str, usize)> = result
            .iter()
            .map(|m| (m.keyword.as_str(), m.count))
            .collect();
        assert_eq!(entries, vec![("sale", 3), ("urgent", 1)]);
        assert_eq!(result.summary(), "sale (3), urgent");
    }

    #[test]
    fn test_scan_missing_or_empty_body() {
        let set = PatternSet::compile(["sale"]);
        assert!(scan(None, &set).is_empty());
        assert!(scan(Some(""), &set).is_empty());
    }

    #[test]
    fn test_overlapping_keywords_count_independently() {
        let set = PatternSet::compile(["new", "new york"]);
        let result = set.scan("new york news, new york!");

        assert_eq!(result.count_of("new"), Some(2));
        assert_eq!(result.count_of("new york"), Some(2));
    }

    #[test]
    fn test_no_zero_counts() {
        let set = PatternSet::compile(["alpha", "beta"]);
        let result = set.scan("alpha only");
        assert_eq!(result.len(), 1);
        assert_eq!(result.count_of("beta"), None);
    }
}
