//! List command implementation.

use crate::Format;
use serde::Serialize;
use txprop_testkit::catalogue;

/// One listed scenario.
#[derive(Debug, Serialize)]
pub struct ScenarioEntry {
    /// Scenario name.
    pub name: &'static str,
    /// Scenario description.
    pub description: &'static str,
}

/// Runs the list command.
pub fn run(format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let entries: Vec<ScenarioEntry> = catalogue()
        .into_iter()
        .map(|s| ScenarioEntry {
            name: s.name,
            description: s.description,
        })
        .collect();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        Format::Text => {
            let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
            for entry in &entries {
                println!("{:width$}  {}", entry.name, entry.description);
            }
        }
    }
    Ok(())
}
