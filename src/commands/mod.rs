//! Command handlers module.
//!
//! - `run.rs`: the watcher itself
//! - `scan.rs`: keyword check of a single text
//! - `config.rs`: resolved configuration display

mod config;
mod run;
mod scan;

pub use config::cmd_config;
pub use run::cmd_run;
pub use scan::cmd_scan;
