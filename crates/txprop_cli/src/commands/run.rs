//! Run command implementation.

use crate::Format;
use thiserror::Error;
use tracing::{debug, warn};
use txprop_testkit::{catalogue, find_scenario, Scenario, ScenarioReport};

/// Errors of the run command.
#[derive(Debug, Error)]
pub enum RunError {
    /// No scenario has the given name.
    #[error("unknown scenario: {0} (see `txprop list`)")]
    UnknownScenario(String),

    /// Some scenarios did not behave as expected.
    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed {
        /// Failed scenarios.
        failed: usize,
        /// Scenarios run.
        total: usize,
    },
}

/// Runs the selected scenarios and prints their reports.
pub fn run(names: &[String], all: bool, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let scenarios = select(names, all)?;

    let reports: Vec<ScenarioReport> = scenarios
        .iter()
        .map(|scenario| {
            debug!(scenario = scenario.name, "running scenario");
            let report = scenario.run();
            if !report.passed {
                warn!(scenario = report.name, "scenario did not behave as expected");
            }
            report
        })
        .collect();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        Format::Text => {
            for report in &reports {
                print_report(report);
            }
        }
    }

    let failed = reports.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        return Err(RunError::ScenariosFailed {
            failed,
            total: reports.len(),
        }
        .into());
    }
    Ok(())
}

fn select(names: &[String], all: bool) -> Result<Vec<Scenario>, RunError> {
    if all {
        return Ok(catalogue());
    }
    names
        .iter()
        .map(|name| find_scenario(name).ok_or_else(|| RunError::UnknownScenario(name.clone())))
        .collect()
}

fn print_report(report: &ScenarioReport) {
    let mark = if report.passed { "✓" } else { "✗" };
    println!("{} {}", mark, report.name);
    println!("  {}", report.description);
    for record in &report.records {
        println!(
            "  {:<8} {:<40} {}",
            record.table,
            record.key,
            if record.present { "stored" } else { "absent" }
        );
    }
    match &report.error {
        Some(error) => println!("  error:   {}", error),
        None => println!("  error:   none"),
    }
    println!(
        "  physical: {} opened, {} committed, {} rolled back",
        report.opened, report.committed, report.rolled_back
    );
    println!();
}
