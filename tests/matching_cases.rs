//! Table tests for whole-word, case-insensitive keyword matching.

// Tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chanwatch::PatternSet;
use chanwatch::matching::{count_occurrences, scan};
use test_case::test_case;

#[test_case("cat", "the cat sat", 1 ; "plain word")]
#[test_case("cat", "Cat!", 1 ; "capitalized with punctuation")]
#[test_case("cat", "category", 0 ; "prefix of longer word")]
#[test_case("cat", "bobcat", 0 ; "suffix of longer word")]
#[test_case("cat", "CAT cat Cat", 3 ; "mixed case repeats")]
#[test_case("sale", "sale,sale;sale", 3 ; "punctuation separated")]
#[test_case("a.b", "a.b axb", 1 ; "dot is literal")]
#[test_case("new york", "New York, new  york", 1 ; "phrase with single space")]
#[test_case("urgent", "", 0 ; "empty text")]
#[test_case("café", "Café au lait", 1 ; "non ascii keyword")]
fn test_count_occurrences(keyword: &str, text: &str, expected: usize) {
    assert_eq!(count_occurrences(keyword, text), expected);
}

#[test_case(&["urgent", "sale"], "URGENT restock", "urgent" ; "single keyword")]
#[test_case(&["urgent", "sale"], "sale! big SALE, urgent", "urgent, sale (2)" ; "encounter order and counts")]
#[test_case(&["sale", "urgent"], "sale! big SALE, urgent", "sale (2), urgent" ; "order follows keyword list")]
#[test_case(&["new", "new york"], "new york", "new, new york" ; "overlapping keywords both count")]
fn test_scan_summary(keywords: &[&str], text: &str, expected: &str) {
    let patterns = PatternSet::compile(keywords.iter().copied());
    assert_eq!(scan(Some(text), &patterns).summary(), expected);
}

#[test_case(None ; "absent text")]
#[test_case(Some("") ; "empty text")]
#[test_case(Some("nothing to see") ; "no keyword")]
fn test_scan_without_match(text: Option<&str>) {
    let patterns = PatternSet::compile(["urgent", "sale"]);
    assert!(scan(text, &patterns).is_empty());
}
