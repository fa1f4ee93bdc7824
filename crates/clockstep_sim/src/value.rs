//! Port declarations, port values, and the per-phase signal snapshot.
//!
//! Ports are addressed by a flat [`PortId`], the index of the port in the
//! model's declaration list. Values are two-state and at most 64 bits wide.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::signal::SignalInterface;

/// Opaque ID for a model port: its index in [`SignalInterface::ports`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct PortId(u32);

impl PortId {
    /// Creates a `PortId` from a raw index.
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the index as a `usize` for slice access.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether the driver or the model owns a port's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Driven by the cycle driver.
    Input,
    /// Driven by the model.
    Output,
}

/// A named port with a direction and a bit width (1 to 64).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDecl {
    /// Port name as it appears in configuration and traces.
    pub name: String,
    /// Input or output.
    pub direction: PortDirection,
    /// Width in bits.
    pub width: u32,
    /// Value an input takes at the start of a run unless configured otherwise.
    pub idle: u64,
}

impl PortDecl {
    /// Declares an input port.
    pub fn input(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            width,
            idle: 0,
        }
    }

    /// Declares an output port.
    pub fn output(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            width,
            idle: 0,
        }
    }

    /// Sets the idle value.
    pub fn with_idle(mut self, idle: u64) -> Self {
        self.idle = idle;
        self
    }

    /// Whether the driver may write this port.
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Bit mask covering the port width.
    pub fn mask(&self) -> u64 {
        width_mask(self.width)
    }
}

/// Returns a mask with the low `width` bits set.
pub fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Port storage for models: declarations plus current values.
///
/// Handles name lookup, direction checks, and width masking so that model
/// implementations only deal with behaviour.
#[derive(Clone, Debug)]
pub struct PortTable {
    decls: Vec<PortDecl>,
    values: Vec<u64>,
}

impl PortTable {
    /// Creates a table with every port at its idle value.
    pub fn new(decls: Vec<PortDecl>) -> Self {
        let values = decls.iter().map(|d| d.idle & d.mask()).collect();
        Self { decls, values }
    }

    /// All declarations, indexed by [`PortId`].
    pub fn decls(&self) -> &[PortDecl] {
        &self.decls
    }

    /// Current value of a port. Unknown ports read as zero.
    pub fn get(&self, id: PortId) -> u64 {
        self.values.get(id.index()).copied().unwrap_or(0)
    }

    /// Writes an input port on behalf of the driver.
    pub fn set_input(&mut self, id: PortId, value: u64) -> Result<(), ModelError> {
        let decl = self
            .decls
            .get(id.index())
            .ok_or_else(|| ModelError::new(format!("no port with ID {}", id.as_raw())))?;
        if !decl.is_input() {
            return Err(ModelError::new(format!(
                "port '{}' is an output and cannot be driven",
                decl.name
            )));
        }
        self.values[id.index()] = value & decl.mask();
        Ok(())
    }

    /// Writes any port on behalf of the model itself.
    pub fn drive(&mut self, id: PortId, value: u64) {
        if let Some(decl) = self.decls.get(id.index()) {
            self.values[id.index()] = value & decl.mask();
        }
    }
}

/// A borrowed view of every port value at one clock phase.
///
/// Only valid for the duration of a single capture call.
pub struct Snapshot<'a> {
    interface: &'a dyn SignalInterface,
}

impl<'a> Snapshot<'a> {
    /// Takes a snapshot of the interface's current state.
    pub fn of(interface: &'a dyn SignalInterface) -> Self {
        Self { interface }
    }

    /// The port declarations, in [`PortId`] order.
    pub fn ports(&self) -> &'a [PortDecl] {
        self.interface.ports()
    }

    /// The value of one port.
    pub fn value(&self, id: PortId) -> u64 {
        self.interface.get(id)
    }

    /// Iterates `(id, declaration, value)` over every port.
    pub fn iter(&self) -> impl Iterator<Item = (PortId, &'a PortDecl, u64)> + '_ {
        self.ports()
            .iter()
            .enumerate()
            .map(move |(i, decl)| {
                let id = PortId::from_raw(i as u32);
                (id, decl, self.value(id))
            })
    }
}
