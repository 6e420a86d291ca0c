//! `list`: show the built-in scenarios.

use serde::Serialize;

use crate::cli::args::{ListArgs, OutputFormat};
use crate::error::CadenceError;
use crate::scenarios::list_scenarios;

#[derive(Serialize)]
struct ScenarioEntry {
    name: &'static str,
    description: &'static str,
    tags: &'static [&'static str],
}

/// Prints built-in scenarios, optionally only those carrying `--tag`.
///
/// # Errors
///
/// Returns a JSON error if the listing cannot be serialized.
pub fn run(args: &ListArgs) -> Result<(), CadenceError> {
    let scenarios = list_scenarios(args.tag.as_deref());
    tracing::debug!(count = scenarios.len(), tag = ?args.tag, "listing scenarios");

    match args.format {
        OutputFormat::Human => {
            if scenarios.is_empty() {
                println!("No scenarios found.");
                return Ok(());
            }
            let width = scenarios.iter().map(|s| s.name.len()).max().unwrap_or(0);
            for scenario in scenarios {
                println!(
                    "{:<width$}  {}  [{}]",
                    scenario.name,
                    scenario.description,
                    scenario.tags.join(", "),
                );
            }
        }
        OutputFormat::Json => {
            let entries: Vec<ScenarioEntry> = scenarios
                .into_iter()
                .map(|s| ScenarioEntry {
                    name: s.name,
                    description: s.description,
                    tags: s.tags,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}
