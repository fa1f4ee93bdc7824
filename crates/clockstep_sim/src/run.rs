//! The run state machine: `Init -> Resetting -> Running -> Draining -> Done`.
//!
//! A [`RunController`] owns the model and the trace sink for exactly one run.
//! [`RunController::run`] consumes it, so a controller can never be reused.
//! Any error aborts the run; the trace guard then abandons the partial trace.

use std::fmt;
use std::path::PathBuf;

use clockstep_config::{validate_config, ConfigError, RunConfig};
use serde::Serialize;

use crate::clock::ClockSequencer;
use crate::error::SimError;
use crate::reset::ResetController;
use crate::signal::SignalInterface;
use crate::stimulus::StimulusGenerator;
use crate::value::PortId;
use crate::waveform::{TraceGuard, TraceSink};

/// Where a run is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RunState {
    /// Model and sink exist; inputs are being brought to idle.
    Init,
    /// Reset is held while the clock runs.
    Resetting,
    /// Stimulus is applied cycle by cycle.
    Running,
    /// The model's end-of-run bookkeeping is running.
    Draining,
    /// The trace is closed and the summary is ready.
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::Resetting => "resetting",
            RunState::Running => "running",
            RunState::Draining => "draining",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a completed run reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// The configured run name.
    pub name: String,
    /// Cycles spent with reset held.
    pub reset_cycles: u64,
    /// Cycles executed after reset.
    pub cycles: u64,
    /// `reset_cycles + cycles`.
    pub total_cycles: u64,
    /// Index of the last post-reset cycle, if any ran.
    pub final_cycle: Option<u64>,
    /// Snapshots handed to the trace sink.
    pub captures: u64,
    /// Whether the model ended the run before the budget did.
    pub finished_by_model: bool,
    /// Where the trace was written, if tracing was enabled.
    pub trace_path: Option<PathBuf>,
}

/// Sequences one run of a model against a configuration.
pub struct RunController<M: SignalInterface, S: TraceSink> {
    config: RunConfig,
    model: M,
    trace: TraceGuard<S>,
    clock_port: PortId,
    clock: ClockSequencer,
    reset: ResetController,
    stimulus: StimulusGenerator,
    idle: Vec<(PortId, u64)>,
    state: RunState,
}

impl<M: SignalInterface, S: TraceSink> RunController<M, S> {
    /// Binds `config` to `model` and takes ownership of both model and sink.
    ///
    /// Every configuration problem, including ports the model does not have,
    /// is reported here, before any clocking happens.
    pub fn new(config: RunConfig, model: M, sink: S) -> Result<Self, SimError> {
        validate_config(&config)?;

        let clock_port = control_port(&model, &config.ports.clock)?;
        let reset_port = control_port(&model, &config.ports.reset)?;
        let idle = idle_levels(&config, &model, clock_port, reset_port)?;
        let stimulus = StimulusGenerator::bind(&config.stimulus, &model)?;
        let reset = ResetController::new(
            reset_port,
            config.ports.reset_asserted_level(),
            config.ports.reset_released_level(),
        );

        Ok(Self {
            config,
            model,
            trace: TraceGuard::new(sink),
            clock_port,
            clock: ClockSequencer::new(clock_port),
            reset,
            stimulus,
            idle,
            state: RunState::Init,
        })
    }

    /// The current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The bound stimulus generator.
    pub fn stimulus(&self) -> &StimulusGenerator {
        &self.stimulus
    }

    /// Executes the whole run and returns its summary.
    pub fn run(mut self) -> Result<RunSummary, SimError> {
        self.init()?;

        self.enter(RunState::Resetting);
        let reset_cycles = self.reset.hold_reset(
            self.config.run.reset_hold_cycles,
            &mut self.model,
            &mut self.clock,
            &mut self.trace,
        )?;

        self.enter(RunState::Running);
        let (cycles, finished_by_model) = self.running()?;

        self.enter(RunState::Draining);
        let cycle = self.clock.next_cycle();
        self.model
            .finalize()
            .map_err(|e| SimError::model(cycle, e))?;

        self.done(reset_cycles, cycles, finished_by_model)
    }

    fn enter(&mut self, next: RunState) {
        tracing::info!(run = %self.config.run.name, from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    /// Opens the trace and drives every input to its idle level.
    fn init(&mut self) -> Result<(), SimError> {
        self.trace.open(&self.config.run.name, self.model.ports())?;
        for &(port, level) in &self.idle {
            self.model
                .set_input(port, level)
                .map_err(|e| SimError::model(0, e))?;
        }
        self.model
            .set_input(self.clock_port, 0)
            .map_err(|e| SimError::model(0, e))?;
        self.reset.assert_line(&mut self.model)?;
        Ok(())
    }

    /// Steps stimulus cycles until the budget runs out or the model finishes.
    fn running(&mut self) -> Result<(u64, bool), SimError> {
        let limit = self.config.run.cycle_budget.limit();
        let mut cycle = 0u64;
        let mut active = vec![false; self.stimulus.channel_count()];

        while limit.map_or(true, |n| cycle < n) {
            let inputs = self.stimulus.compute_inputs(cycle);
            for (was_active, drive) in active.iter_mut().zip(inputs.drives()) {
                if *was_active != drive.valid {
                    tracing::debug!(cycle, port = drive.data.as_raw(), valid = drive.valid, "stimulus window edge");
                    *was_active = drive.valid;
                }
            }

            let run_cycle = self.clock.next_cycle();
            inputs
                .apply(&mut self.model)
                .map_err(|e| SimError::model(run_cycle, e))?;
            self.clock
                .step_cycle(&mut self.model, &mut self.trace, run_cycle)?;
            cycle += 1;

            if self.model.is_finished() {
                tracing::info!(cycle = cycle - 1, "model signalled completion");
                return Ok((cycle, true));
            }
        }
        Ok((cycle, false))
    }

    /// Closes the trace and releases the model.
    fn done(
        mut self,
        reset_cycles: u64,
        cycles: u64,
        finished_by_model: bool,
    ) -> Result<RunSummary, SimError> {
        self.trace.close()?;
        self.enter(RunState::Done);
        Ok(RunSummary {
            name: self.config.run.name.clone(),
            reset_cycles,
            cycles,
            total_cycles: reset_cycles + cycles,
            final_cycle: cycles.checked_sub(1),
            captures: self.trace.captures(),
            finished_by_model,
            trace_path: self.trace.location().map(PathBuf::from),
        })
    }
}

/// Resolves a clock or reset binding: a 1-bit input.
fn control_port<M: SignalInterface>(model: &M, name: &str) -> Result<PortId, ConfigError> {
    let id = model
        .find_port(name)
        .ok_or_else(|| ConfigError::UnknownPort(name.to_string()))?;
    let decl = &model.ports()[id.index()];
    if !decl.is_input() || decl.width != 1 {
        return Err(ConfigError::ValidationError(format!(
            "'{name}' must be a 1-bit input to serve as clock or reset"
        )));
    }
    Ok(id)
}

/// Computes the start-of-run level of every input other than clock and reset.
fn idle_levels<M: SignalInterface>(
    config: &RunConfig,
    model: &M,
    clock: PortId,
    reset: PortId,
) -> Result<Vec<(PortId, u64)>, ConfigError> {
    for (name, &value) in &config.inputs {
        let id = model
            .find_port(name)
            .ok_or_else(|| ConfigError::UnknownPort(name.clone()))?;
        let decl = &model.ports()[id.index()];
        if !decl.is_input() {
            return Err(ConfigError::ValidationError(format!(
                "cannot set idle value of output port '{name}'"
            )));
        }
        if id == clock || id == reset {
            return Err(ConfigError::ValidationError(format!(
                "idle value of '{name}' is owned by the clock/reset driver"
            )));
        }
        if value & !decl.mask() != 0 {
            return Err(ConfigError::ValidationError(format!(
                "idle value {value:#x} does not fit the {}-bit port '{name}'",
                decl.width
            )));
        }
    }

    Ok(model
        .ports()
        .iter()
        .enumerate()
        .map(|(i, decl)| (PortId::from_raw(i as u32), decl))
        .filter(|(id, decl)| decl.is_input() && *id != clock && *id != reset)
        .map(|(id, decl)| {
            let level = config.inputs.get(&decl.name).copied().unwrap_or(decl.idle);
            (id, level)
        })
        .collect())
}
