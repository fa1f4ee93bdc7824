//! Cycle-accurate driver for clocked, synchronously reset models.
//!
//! The driver owns a model behind the [`SignalInterface`] trait and runs it
//! through a fixed lifecycle: bring inputs to idle, hold reset for a number
//! of cycles, apply open-loop stimulus cycle by cycle, then let the model
//! finalize. Every clock phase is captured into a [`TraceSink`], normally a
//! VCD file.
//!
//! # Usage
//!
//! ```ignore
//! use clockstep_config::preset;
//! use clockstep_sim::simulate;
//!
//! let config = preset("formal")?;
//! let summary = simulate(&config)?;
//! println!("Simulation completed after {} cycles", summary.total_cycles);
//! ```
//!
//! # Modules
//!
//! - `error`: Model, trace, and run error types
//! - `time`: Cycle/phase virtual time
//! - `value`: Port declarations, port tables, snapshots
//! - `signal`: The model-facing trait
//! - `waveform`: Trace sinks (VCD, gzip VCD, null) and the trace guard
//! - `clock`: Two-phase clock stepping
//! - `reset`: Reset hold and release
//! - `stimulus`: Window-based input generation
//! - `run`: The run state machine
//! - `models`: Built-in behavioural models

#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod models;
pub mod reset;
pub mod run;
pub mod signal;
pub mod stimulus;
pub mod time;
pub mod value;
pub mod waveform;

use std::path::PathBuf;

use clockstep_config::RunConfig;

pub use clock::ClockSequencer;
pub use error::{ModelError, SimError, TraceError};
pub use models::{build_model, Counter, StreamModel, MODEL_KINDS};
pub use reset::ResetController;
pub use run::{RunController, RunState, RunSummary};
pub use signal::SignalInterface;
pub use stimulus::{ChannelDrive, InputValues, StimulusGenerator};
pub use time::{Phase, VirtualTime};
pub use value::{PortDecl, PortDirection, PortId, PortTable, Snapshot};
pub use waveform::{
    check_trace_location, NullTraceSink, TraceGuard, TraceSink, VcdTraceSink, VcdWriter,
};

/// High-level entry point: builds the configured model and runs it.
pub fn simulate(config: &RunConfig) -> Result<RunSummary, SimError> {
    let model = build_model(&config.model)?;
    simulate_model(config, model)
}

/// Runs `model` under `config`, tracing to the configured location.
///
/// The trace location is checked before the model is touched, so an
/// unwritable path fails as a configuration error.
pub fn simulate_model<M: SignalInterface>(
    config: &RunConfig,
    model: M,
) -> Result<RunSummary, SimError> {
    let sink: Box<dyn TraceSink> = if config.trace.enabled {
        let path = PathBuf::from(config.trace_output());
        check_trace_location(&path)?;
        Box::new(VcdTraceSink::new(
            path,
            config.trace.timescale.clone(),
            config.trace.compress,
        ))
    } else {
        Box::new(NullTraceSink::new())
    };
    RunController::new(config.clone(), model, sink)?.run()
}
