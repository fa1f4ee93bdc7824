//! `clockstep check`: validate a configuration against its model.
//!
//! Anything a run would reject before its first clock edge is rejected here
//! too, including an unwritable trace location.

use std::path::PathBuf;

use clockstep_sim::{
    build_model, check_trace_location, NullTraceSink, RunController, SignalInterface,
};

use crate::pipeline::resolve_config;
use crate::{GlobalArgs, ReportFormat, RunArgs};

/// Runs the `clockstep check` command. Returns exit code 0 if the
/// configuration would start a run.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;

    if config.trace.enabled {
        check_trace_location(&PathBuf::from(config.trace_output()))?;
    }
    let model = build_model(&config.model)?;
    let port_count = model.ports().len();
    let controller = RunController::new(config.clone(), model, NullTraceSink::new())?;
    let channels = controller.stimulus().channel_count();

    match global.format {
        ReportFormat::Json => {
            let report = serde_json::json!({
                "name": config.run.name,
                "model": config.model.kind,
                "ports": port_count,
                "stimulus_channels": channels,
                "reset_hold_cycles": config.run.reset_hold_cycles,
                "cycle_budget": config.run.cycle_budget.to_string(),
                "trace": config.trace.enabled.then(|| config.trace_output()),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ReportFormat::Text => {
            if !global.quiet {
                eprintln!(
                    "    Checked {} ({} model, {port_count} ports, {channels} stimulus channel(s), budget {})",
                    config.run.name, config.model.kind, config.run.cycle_budget
                );
            }
        }
    }
    Ok(0)
}
