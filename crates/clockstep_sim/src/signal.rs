//! The boundary between the cycle driver and the hardware model.

use crate::error::ModelError;
use crate::value::{PortDecl, PortId};

/// An evaluable hardware model exposing named ports.
///
/// The driver only ever writes inputs, calls [`evaluate`](Self::evaluate),
/// and reads values back for tracing. Everything else about the model is
/// opaque.
pub trait SignalInterface {
    /// Every port of the model. A port's [`PortId`] is its index here.
    fn ports(&self) -> &[PortDecl];

    /// Current value of a port.
    fn get(&self, port: PortId) -> u64;

    /// Sets an input port. Takes effect at the next [`evaluate`](Self::evaluate).
    fn set_input(&mut self, port: PortId, value: u64) -> Result<(), ModelError>;

    /// Propagates the current inputs to internal and output state.
    fn evaluate(&mut self) -> Result<(), ModelError>;

    /// End-of-run bookkeeping.
    fn finalize(&mut self) -> Result<(), ModelError> {
        Ok(())
    }

    /// Whether the model has signalled that the run should stop.
    fn is_finished(&self) -> bool {
        false
    }

    /// Looks a port up by name.
    fn find_port(&self, name: &str) -> Option<PortId> {
        self.ports()
            .iter()
            .position(|p| p.name == name)
            .map(|i| PortId::from_raw(i as u32))
    }
}

impl<T: SignalInterface + ?Sized> SignalInterface for Box<T> {
    fn ports(&self) -> &[PortDecl] {
        (**self).ports()
    }

    fn get(&self, port: PortId) -> u64 {
        (**self).get(port)
    }

    fn set_input(&mut self, port: PortId, value: u64) -> Result<(), ModelError> {
        (**self).set_input(port, value)
    }

    fn evaluate(&mut self) -> Result<(), ModelError> {
        (**self).evaluate()
    }

    fn finalize(&mut self) -> Result<(), ModelError> {
        (**self).finalize()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn find_port(&self, name: &str) -> Option<PortId> {
        (**self).find_port(name)
    }
}
