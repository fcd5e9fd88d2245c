//! Config command handler.

use chanwatch::WatchConfig;

/// Prints the resolved configuration with secrets redacted.
pub fn cmd_config(config: &WatchConfig) -> chanwatch::Result<()> {
    println!("{config}");
    if let Err(e) = config.validate() {
        println!();
        println!("warning: {e}");
    }
    Ok(())
}
