//! Scan command handler.

use chanwatch::matching::scan;
use chanwatch::{Error, PatternSet, WatchConfig};

/// Prints the keyword matches of `text`.
pub fn cmd_scan(config: &WatchConfig, text: &str) -> chanwatch::Result<()> {
    let patterns = PatternSet::compile(&config.keywords);
    if patterns.is_empty() {
        return Err(Error::Config("no usable keywords".to_string()));
    }

    let matches = scan(Some(text), &patterns);
    if matches.is_empty() {
        println!("no match");
    } else {
        println!("{}", matches.summary());
    }
    Ok(())
}
