//! Command-line control plane.
//!
//! Every command loads configuration, opens the database and runs against
//! the same repositories and services `serve` uses.

pub mod commands;
pub mod output;
pub mod table;
pub mod types;

pub use types::{Cli, Commands};

use serde_json::json;

/// Print a command failure in the requested format.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = json!({ "success": false, "error": err.to_string(), "caused_by": chain });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
}
