//! Virtual time: clock phases and the trace ordering key.
//!
//! A [`VirtualTime`] is derived from a run cycle and a [`Phase`] as
//! `2 * cycle + phase`, so consecutive phases of consecutive cycles map to
//! consecutive integers with no gaps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One half of a clock period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Clock driven low.
    Low = 0,
    /// Clock driven high.
    High = 1,
}

impl Phase {
    /// Both phases in the order they are applied within a cycle.
    pub const CYCLE: [Phase; 2] = [Phase::Low, Phase::High];

    /// The clock line level for this phase.
    pub fn level(self) -> u64 {
        self as u64
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Low => f.write_str("low"),
            Phase::High => f.write_str("high"),
        }
    }
}

/// Monotonic trace timestamp, independent of wall-clock time.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The timestamp of the low phase of `cycle` or its high phase.
    pub fn new(cycle: u64, phase: Phase) -> Self {
        Self(2 * cycle + phase as u64)
    }

    /// Wraps a raw timestamp.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw timestamp.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// The run cycle this timestamp belongs to.
    pub fn cycle(self) -> u64 {
        self.0 / 2
    }

    /// The clock phase this timestamp belongs to.
    pub fn phase(self) -> Phase {
        if self.0 % 2 == 0 {
            Phase::Low
        } else {
            Phase::High
        }
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
