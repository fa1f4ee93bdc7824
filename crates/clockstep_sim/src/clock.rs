//! Two-phase clock stepping.

use crate::error::SimError;
use crate::signal::SignalInterface;
use crate::time::{Phase, VirtualTime};
use crate::value::{PortId, Snapshot};
use crate::waveform::{TraceGuard, TraceSink};

/// Drives one clock input through low and high phases, evaluating the model
/// and capturing a snapshot after each transition.
#[derive(Debug)]
pub struct ClockSequencer {
    clock: PortId,
    next_cycle: u64,
}

impl ClockSequencer {
    /// Creates a sequencer for `clock`, starting at run cycle zero.
    pub fn new(clock: PortId) -> Self {
        Self {
            clock,
            next_cycle: 0,
        }
    }

    /// The run cycle the next [`step_cycle`](Self::step_cycle) must use.
    pub fn next_cycle(&self) -> u64 {
        self.next_cycle
    }

    /// Runs one full clock period.
    ///
    /// Low phase is captured at `2 * cycle`, high phase at `2 * cycle + 1`.
    /// Cycles must be stepped in order with no gaps.
    pub fn step_cycle<M, S>(
        &mut self,
        model: &mut M,
        trace: &mut TraceGuard<S>,
        cycle: u64,
    ) -> Result<(), SimError>
    where
        M: SignalInterface,
        S: TraceSink,
    {
        if cycle != self.next_cycle {
            return Err(SimError::SequenceViolation {
                expected: self.next_cycle,
                got: cycle,
            });
        }
        for phase in Phase::CYCLE {
            model
                .set_input(self.clock, phase.level())
                .map_err(|e| SimError::model(cycle, e))?;
            model.evaluate().map_err(|e| SimError::model(cycle, e))?;
            let time = VirtualTime::new(cycle, phase);
            trace.capture(time, &Snapshot::of(&*model))?;
            tracing::trace!(cycle, %phase, time = time.as_u64(), "captured phase");
        }
        self.next_cycle += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModelError, TraceError};
    use crate::value::{PortDecl, PortTable};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records the clock level seen at each evaluation.
    struct ClockProbe {
        ports: PortTable,
        seen: Vec<u64>,
    }

    impl ClockProbe {
        fn new() -> Self {
            Self {
                ports: PortTable::new(vec![PortDecl::input("clk_i", 1)]),
                seen: Vec::new(),
            }
        }
    }

    impl SignalInterface for ClockProbe {
        fn ports(&self) -> &[PortDecl] {
            self.ports.decls()
        }

        fn get(&self, port: PortId) -> u64 {
            self.ports.get(port)
        }

        fn set_input(&mut self, port: PortId, value: u64) -> Result<(), ModelError> {
            self.ports.set_input(port, value)
        }

        fn evaluate(&mut self) -> Result<(), ModelError> {
            self.seen.push(self.ports.get(PortId::from_raw(0)));
            Ok(())
        }
    }

    /// Stores `(time, clock)` pairs in shared storage.
    struct Capture(Rc<RefCell<Vec<(u64, u64)>>>);

    impl TraceSink for Capture {
        fn open(&mut self, _name: &str, _ports: &[PortDecl]) -> Result<(), TraceError> {
            Ok(())
        }

        fn capture(&mut self, time: VirtualTime, snapshot: &Snapshot<'_>) -> Result<(), TraceError> {
            self.0
                .borrow_mut()
                .push((time.as_u64(), snapshot.value(PortId::from_raw(0))));
            Ok(())
        }

        fn close(&mut self) -> Result<(), TraceError> {
            Ok(())
        }
    }

    #[test]
    fn one_cycle_is_two_evaluations_and_two_captures() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut model = ClockProbe::new();
        let mut trace = TraceGuard::new(Capture(log.clone()));
        let mut clock = ClockSequencer::new(PortId::from_raw(0));

        clock.step_cycle(&mut model, &mut trace, 0).unwrap();
        clock.step_cycle(&mut model, &mut trace, 1).unwrap();

        assert_eq!(model.seen, vec![0, 1, 0, 1]);
        assert_eq!(*log.borrow(), vec![(0, 0), (1, 1), (2, 0), (3, 1)]);
        assert_eq!(trace.captures(), 4);
        assert_eq!(clock.next_cycle(), 2);
    }

    #[test]
    fn capture_sees_post_evaluation_state() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut model = ClockProbe::new();
        let mut trace = TraceGuard::new(Capture(log.clone()));
        let mut clock = ClockSequencer::new(PortId::from_raw(0));
        clock.step_cycle(&mut model, &mut trace, 0).unwrap();
        for (i, (_, level)) in log.borrow().iter().enumerate() {
            assert_eq!(*level, model.seen[i]);
        }
    }

    #[test]
    fn skipped_cycle_is_rejected() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut model = ClockProbe::new();
        let mut trace = TraceGuard::new(Capture(log));
        let mut clock = ClockSequencer::new(PortId::from_raw(0));
        let err = clock.step_cycle(&mut model, &mut trace, 3).unwrap_err();
        assert!(matches!(
            err,
            SimError::SequenceViolation {
                expected: 0,
                got: 3
            }
        ));
        assert!(model.seen.is_empty());
    }

    #[test]
    fn bad_clock_port_is_a_model_fault() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut model = ClockProbe::new();
        let mut trace = TraceGuard::new(Capture(log));
        let mut clock = ClockSequencer::new(PortId::from_raw(7));
        let err = clock.step_cycle(&mut model, &mut trace, 0).unwrap_err();
        assert!(matches!(err, SimError::Model { cycle: 0, .. }));
    }
}
