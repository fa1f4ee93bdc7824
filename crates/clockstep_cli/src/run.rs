//! `clockstep run`: execute one run and report the outcome.

use clockstep_sim::RunSummary;

use crate::pipeline::resolve_config;
use crate::{GlobalArgs, ReportFormat, RunArgs};

/// Runs the `clockstep run` command.
///
/// Resolves the configuration, builds the model, and drives it to
/// completion. Returns exit code 0 on normal completion; every failure is
/// returned as an error and mapped to exit code 1 by `main`.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    tracing::debug!(
        name = %config.run.name,
        budget = %config.run.cycle_budget,
        trace = config.trace.enabled,
        "resolved run configuration"
    );

    if !global.quiet && global.format == ReportFormat::Text {
        eprintln!("   Simulating {}", config.run.name);
    }

    let summary = clockstep_sim::simulate(&config)?;
    report(&summary, global)?;
    Ok(0)
}

fn report(summary: &RunSummary, global: &GlobalArgs) -> Result<(), Box<dyn std::error::Error>> {
    match global.format {
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        ReportFormat::Text => {
            println!("{}", completion_message(summary));
            if !global.quiet {
                if let Some(cycle) = summary.final_cycle.filter(|_| summary.finished_by_model) {
                    eprintln!("   Model finished at cycle {cycle}");
                }
                if let Some(path) = &summary.trace_path {
                    eprintln!("   Waveform: {}", path.display());
                }
            }
        }
    }
    Ok(())
}

/// The line printed on normal completion. Reset cycles are clocked too, so
/// they count toward the total.
fn completion_message(summary: &RunSummary) -> String {
    format!(
        "Simulation completed after {} cycles ({} reset + {})",
        summary.total_cycles, summary.reset_cycles, summary.cycles
    )
}
