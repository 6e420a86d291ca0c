//! Version information display.

use serde_json::json;

use crate::cli::args::{OutputFormat, VersionArgs};
use crate::scenarios::list_scenario_names;

/// Print version information.
pub fn run(args: &VersionArgs) {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    match args.format {
        OutputFormat::Human => {
            println!("{name} {version}");
        }
        OutputFormat::Json => {
            let info = json!({
                "name": name,
                "version": version,
                "scenarios": list_scenario_names(),
            });
            println!("{info}");
        }
    }
}
