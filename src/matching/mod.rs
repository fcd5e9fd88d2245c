//! Keyword matching.
//!
//! Keywords are compiled once into a [`PatternSet`]. Each message body is
//! scanned into a [`MatchResult`], and a non-empty result is turned into the
//! notification text by [`format_notification`].
//!
//! Matching is whole-word and case-insensitive: `cat` matches `Cat!` and
//! `the cat sat` but not `category`. Every keyword is counted against the
//! full body on its own, so `new` and `new york` both count in
//! `"new york news"`.

mod notification;
mod patterns;
mod scanner;

pub use notification::{MAX_BODY_CHARS, Origin, TRUNCATION_MARKER, format_notification, truncate_chars};
pub use patterns::{DEFAULT_SIZE_LIMIT, Keyword, PatternSet, count_occurrences};
pub use scanner::{KeywordMatch, MatchResult, scan};
