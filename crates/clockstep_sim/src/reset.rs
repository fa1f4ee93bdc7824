//! Synchronous reset sequencing.

use crate::clock::ClockSequencer;
use crate::error::SimError;
use crate::signal::SignalInterface;
use crate::value::PortId;
use crate::waveform::{TraceGuard, TraceSink};

/// Holds the reset line asserted for a fixed number of cycles, then releases
/// it exactly once.
///
/// Clocking and tracing continue while reset is held.
#[derive(Debug)]
pub struct ResetController {
    port: PortId,
    asserted_level: u64,
    released_level: u64,
    released: bool,
}

impl ResetController {
    /// Creates a controller for `port` with the given line levels.
    pub fn new(port: PortId, asserted_level: u64, released_level: u64) -> Self {
        Self {
            port,
            asserted_level,
            released_level,
            released: false,
        }
    }

    /// Whether reset has been released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Drives the reset line to its asserted level.
    pub fn assert_line<M: SignalInterface>(&self, model: &mut M) -> Result<(), SimError> {
        if self.released {
            return Err(SimError::ResetReleased);
        }
        model
            .set_input(self.port, self.asserted_level)
            .map_err(|e| SimError::model(0, e))
    }

    /// Runs `cycles` clock periods with reset asserted, then releases it.
    ///
    /// Returns the number of cycles stepped.
    pub fn hold_reset<M, S>(
        &mut self,
        cycles: u64,
        model: &mut M,
        clock: &mut ClockSequencer,
        trace: &mut TraceGuard<S>,
    ) -> Result<u64, SimError>
    where
        M: SignalInterface,
        S: TraceSink,
    {
        self.assert_line(model)?;
        for _ in 0..cycles {
            let cycle = clock.next_cycle();
            clock.step_cycle(model, trace, cycle)?;
        }
        self.release(model, clock.next_cycle())?;
        Ok(cycles)
    }

    /// Drives the reset line to its released level. Only allowed once.
    fn release<M: SignalInterface>(&mut self, model: &mut M, cycle: u64) -> Result<(), SimError> {
        if self.released {
            return Err(SimError::ResetReleased);
        }
        model
            .set_input(self.port, self.released_level)
            .map_err(|e| SimError::model(cycle, e))?;
        self.released = true;
        tracing::debug!(cycle, "reset released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::value::{PortDecl, PortTable};
    use crate::waveform::NullTraceSink;

    const CLK: PortId = PortId::from_raw(0);
    const RST: PortId = PortId::from_raw(1);

    /// Logs the reset level at every evaluation and every reset write.
    struct ResetProbe {
        ports: PortTable,
        levels_at_eval: Vec<u64>,
        reset_writes: Vec<u64>,
    }

    impl ResetProbe {
        fn new() -> Self {
            Self {
                ports: PortTable::new(vec![
                    PortDecl::input("clk_i", 1),
                    PortDecl::input("reset_n_i", 1),
                ]),
                levels_at_eval: Vec::new(),
                reset_writes: Vec::new(),
            }
        }
    }

    impl SignalInterface for ResetProbe {
        fn ports(&self) -> &[PortDecl] {
            self.ports.decls()
        }

        fn get(&self, port: PortId) -> u64 {
            self.ports.get(port)
        }

        fn set_input(&mut self, port: PortId, value: u64) -> Result<(), ModelError> {
            if port == RST {
                self.reset_writes.push(value);
            }
            self.ports.set_input(port, value)
        }

        fn evaluate(&mut self) -> Result<(), ModelError> {
            self.levels_at_eval.push(self.ports.get(RST));
            Ok(())
        }
    }

    fn open_guard() -> TraceGuard<NullTraceSink> {
        let mut guard = TraceGuard::new(NullTraceSink::new());
        guard.open("reset", &[]).unwrap();
        guard
    }

    #[test]
    fn holds_for_exactly_n_cycles_then_releases_once() {
        let mut model = ResetProbe::new();
        let mut clock = ClockSequencer::new(CLK);
        let mut trace = open_guard();
        let mut reset = ResetController::new(RST, 0, 1);

        let held = reset.hold_reset(5, &mut model, &mut clock, &mut trace).unwrap();

        assert_eq!(held, 5);
        assert!(reset.is_released());
        assert_eq!(model.levels_at_eval, vec![0; 10]);
        assert_eq!(model.reset_writes, vec![0, 1]);
        assert_eq!(model.ports.get(RST), 1);
        assert_eq!(clock.next_cycle(), 5);
        assert_eq!(trace.captures(), 10);
    }

    #[test]
    fn active_high_polarity() {
        let mut model = ResetProbe::new();
        let mut clock = ClockSequencer::new(CLK);
        let mut trace = open_guard();
        let mut reset = ResetController::new(RST, 1, 0);
        reset.hold_reset(2, &mut model, &mut clock, &mut trace).unwrap();
        assert_eq!(model.levels_at_eval, vec![1; 4]);
        assert_eq!(model.ports.get(RST), 0);
    }

    #[test]
    fn second_hold_is_rejected() {
        let mut model = ResetProbe::new();
        let mut clock = ClockSequencer::new(CLK);
        let mut trace = open_guard();
        let mut reset = ResetController::new(RST, 0, 1);
        reset.hold_reset(1, &mut model, &mut clock, &mut trace).unwrap();
        let err = reset
            .hold_reset(1, &mut model, &mut clock, &mut trace)
            .unwrap_err();
        assert!(matches!(err, SimError::ResetReleased));
        assert_eq!(model.reset_writes, vec![0, 1]);
    }
}
