//! Open-loop stimulus computed from the cycle index.
//!
//! Each channel owns one data input and, optionally, a valid line. While a
//! cycle falls inside one of the channel's windows the data input carries
//! `base + increment * (cycle - start)` and valid is high; outside every
//! window valid is low and the data input is left alone.

use clockstep_config::{ConfigError, StimulusWindow};

use crate::error::ModelError;
use crate::signal::SignalInterface;
use crate::value::PortId;

/// Value of `window` on `cycle`, if the cycle falls inside it.
fn window_value(window: &StimulusWindow, cycle: u64) -> Option<u64> {
    window.contains(cycle).then(|| {
        window
            .base
            .wrapping_add(window.increment.wrapping_mul(cycle - window.start))
    })
}

#[derive(Debug, Clone)]
struct Channel {
    name: String,
    data: PortId,
    mask: u64,
    valid: Option<PortId>,
    /// Sorted by start, non-overlapping.
    windows: Vec<StimulusWindow>,
}

/// What one channel drives on a given cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelDrive {
    /// The data input.
    pub data: PortId,
    /// The valid line, if the channel has one.
    pub valid_port: Option<PortId>,
    /// Whether a window is active this cycle.
    pub valid: bool,
    /// The data value, present only while valid.
    pub value: Option<u64>,
}

/// The full set of input changes for one cycle, in channel order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputValues {
    drives: Vec<ChannelDrive>,
}

impl InputValues {
    /// Per-channel drives.
    pub fn drives(&self) -> &[ChannelDrive] {
        &self.drives
    }

    /// The drive for the channel whose data input is `data`.
    pub fn for_input(&self, data: PortId) -> Option<&ChannelDrive> {
        self.drives.iter().find(|d| d.data == data)
    }

    /// Flattens the drives into `(port, value)` writes.
    pub fn assignments(&self) -> Vec<(PortId, u64)> {
        let mut writes = Vec::with_capacity(self.drives.len() * 2);
        for drive in &self.drives {
            if let Some(value) = drive.value {
                writes.push((drive.data, value));
            }
            if let Some(valid) = drive.valid_port {
                writes.push((valid, u64::from(drive.valid)));
            }
        }
        writes
    }

    /// Writes every assignment into the model.
    pub fn apply<M: SignalInterface + ?Sized>(&self, model: &mut M) -> Result<(), ModelError> {
        for (port, value) in self.assignments() {
            model.set_input(port, value)?;
        }
        Ok(())
    }
}

/// Computes per-cycle input values from validated stimulus windows.
#[derive(Debug, Clone, Default)]
pub struct StimulusGenerator {
    channels: Vec<Channel>,
}

impl StimulusGenerator {
    /// Resolves window port names against `model` and groups windows into channels.
    ///
    /// Fails if a port is unknown or not an input, or if windows on one input
    /// overlap or disagree about their valid line.
    pub fn bind<M: SignalInterface + ?Sized>(
        windows: &[StimulusWindow],
        model: &M,
    ) -> Result<Self, ConfigError> {
        let mut channels: Vec<Channel> = Vec::new();

        for w in windows {
            if w.start >= w.end {
                return Err(ConfigError::ValidationError(format!(
                    "stimulus window on '{}' is empty: [{}, {})",
                    w.input, w.start, w.end
                )));
            }
            let data = input_port(model, &w.input)?;
            let valid = w
                .valid
                .as_deref()
                .map(|name| input_port(model, name))
                .transpose()?;
            let index = match channels.iter().position(|c| c.data == data) {
                Some(index) => index,
                None => {
                    channels.push(Channel {
                        name: w.input.clone(),
                        data,
                        mask: model.ports()[data.index()].mask(),
                        valid,
                        windows: Vec::new(),
                    });
                    channels.len() - 1
                }
            };
            let channel = &mut channels[index];
            if channel.valid != valid {
                return Err(ConfigError::ValidationError(format!(
                    "stimulus windows on '{}' name different valid lines",
                    channel.name
                )));
            }
            if let Some(existing) = channel.windows.iter().find(|e| e.overlaps(w)) {
                return Err(ConfigError::OverlappingWindows {
                    input: channel.name.clone(),
                    first_start: existing.start,
                    first_end: existing.end,
                    second_start: w.start,
                    second_end: w.end,
                });
            }
            channel.windows.push(w.clone());
        }

        for channel in &mut channels {
            channel.windows.sort_by_key(|w| w.start);
        }
        Ok(Self { channels })
    }

    /// Number of independent input channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// The inputs to apply on `cycle`. Depends on nothing but `cycle`.
    pub fn compute_inputs(&self, cycle: u64) -> InputValues {
        let drives = self
            .channels
            .iter()
            .map(|channel| {
                let value = channel
                    .windows
                    .iter()
                    .find_map(|w| window_value(w, cycle))
                    .map(|v| v & channel.mask);
                ChannelDrive {
                    data: channel.data,
                    valid_port: channel.valid,
                    valid: value.is_some(),
                    value,
                }
            })
            .collect();
        InputValues { drives }
    }
}

fn input_port<M: SignalInterface + ?Sized>(model: &M, name: &str) -> Result<PortId, ConfigError> {
    let id = model
        .find_port(name)
        .ok_or_else(|| ConfigError::UnknownPort(name.to_string()))?;
    if !model.ports()[id.index()].is_input() {
        return Err(ConfigError::ValidationError(format!(
            "stimulus cannot drive output port '{name}'"
        )));
    }
    Ok(id)
}
