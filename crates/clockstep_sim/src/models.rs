//! Built-in behavioural models.
//!
//! These stand in for a compiled design so that runs can be driven end to end
//! from a configuration file. Both use an active-low synchronous reset on
//! `reset_n_i` and update state on the rising edge of `clk_i`.

use clockstep_config::{ConfigError, ModelConfig};

use crate::error::{ModelError, SimError};
use crate::signal::SignalInterface;
use crate::value::{PortDecl, PortId, PortTable};

/// Names accepted by [`build_model`].
pub const MODEL_KINDS: &[&str] = &["counter", "stream"];

/// Instantiates the built-in model named by `config.kind`.
pub fn build_model(config: &ModelConfig) -> Result<Box<dyn SignalInterface>, SimError> {
    match config.kind.as_str() {
        "counter" => {
            let width = config.param("width").unwrap_or(8);
            if width == 0 || width > 64 {
                return Err(SimError::Config(ConfigError::ValidationError(format!(
                    "model.width {width} is out of range 1..=64"
                ))));
            }
            Ok(Box::new(Counter::new(width as u32, config.param("finish_at"))))
        }
        "stream" => Ok(Box::new(StreamModel::new(config.param("finish_after")))),
        other => Err(SimError::UnknownModel(other.to_string())),
    }
}

/// Tracks the previous clock level to find rising edges.
#[derive(Debug, Default)]
struct EdgeDetector {
    last: u64,
}

impl EdgeDetector {
    fn rising(&mut self, level: u64) -> bool {
        let rose = self.last == 0 && level == 1;
        self.last = level;
        rose
    }
}

/// Free-running counter with an optional completion value.
#[derive(Debug)]
pub struct Counter {
    ports: PortTable,
    edge: EdgeDetector,
    count: u64,
    finish_at: Option<u64>,
}

impl Counter {
    const CLK: PortId = PortId::from_raw(0);
    const RESET_N: PortId = PortId::from_raw(1);
    const ENABLE: PortId = PortId::from_raw(2);
    const COUNT: PortId = PortId::from_raw(3);
    const DONE: PortId = PortId::from_raw(4);

    /// Creates a counter of `width` bits. If `finish_at` is set the model
    /// reports completion once the count reaches it.
    pub fn new(width: u32, finish_at: Option<u64>) -> Self {
        let ports = PortTable::new(vec![
            PortDecl::input("clk_i", 1),
            PortDecl::input("reset_n_i", 1),
            PortDecl::input("enable_i", 1).with_idle(1),
            PortDecl::output("count_o", width),
            PortDecl::output("done_o", 1),
        ]);
        Self {
            ports,
            edge: EdgeDetector::default(),
            count: 0,
            finish_at,
        }
    }

    fn mask(&self) -> u64 {
        self.ports.decls()[Self::COUNT.index()].mask()
    }
}

impl SignalInterface for Counter {
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
        if self.edge.rising(self.ports.get(Self::CLK)) {
            if self.ports.get(Self::RESET_N) == 0 {
                self.count = 0;
            } else if self.ports.get(Self::ENABLE) == 1 {
                self.count = self.count.wrapping_add(1) & self.mask();
            }
        }
        self.ports.drive(Self::COUNT, self.count);
        self.ports.drive(Self::DONE, u64::from(self.is_finished()));
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finish_at.is_some_and(|target| self.count >= target)
    }
}

/// Valid/ready audio sample consumer.
///
/// Accepts a 16-bit sample on every rising edge where `audio_valid_i` and
/// `audio_ready_o` are both high, keeping a running count and a rotating XOR
/// checksum. `audio_ready_o` follows `frame_ready_i` outside reset.
#[derive(Debug)]
pub struct StreamModel {
    ports: PortTable,
    edge: EdgeDetector,
    samples: u64,
    checksum: u16,
    finish_after: Option<u64>,
    finalized: bool,
}

impl StreamModel {
    const CLK: PortId = PortId::from_raw(0);
    const RESET_N: PortId = PortId::from_raw(1);
    const AUDIO_DATA: PortId = PortId::from_raw(2);
    const AUDIO_VALID: PortId = PortId::from_raw(3);
    const FRAME_READY: PortId = PortId::from_raw(6);
    const BITRATE_SEL: PortId = PortId::from_raw(9);
    const BANDWIDTH_SEL: PortId = PortId::from_raw(10);
    const AUDIO_READY_OUT: PortId = PortId::from_raw(11);
    const SAMPLE_COUNT: PortId = PortId::from_raw(12);
    const CHECKSUM: PortId = PortId::from_raw(13);
    const DONE: PortId = PortId::from_raw(14);

    /// Highest legal `bitrate_sel_i` value.
    pub const MAX_BITRATE_SEL: u64 = 7;
    /// Highest legal `bandwidth_sel_i` value.
    pub const MAX_BANDWIDTH_SEL: u64 = 2;

    /// Creates the model. If `finish_after` is set the model reports
    /// completion after that many accepted samples.
    pub fn new(finish_after: Option<u64>) -> Self {
        let ports = PortTable::new(vec![
            PortDecl::input("clk_i", 1),
            PortDecl::input("reset_n_i", 1),
            PortDecl::input("audio_data_i", 16),
            PortDecl::input("audio_valid_i", 1),
            PortDecl::input("audio_ready_i", 1),
            PortDecl::input("frame_bus_ready_i", 1),
            PortDecl::input("frame_ready_i", 1),
            PortDecl::input("packet_ready_i", 1),
            PortDecl::input("encode_mode_i", 1),
            PortDecl::input("bitrate_sel_i", 4),
            PortDecl::input("bandwidth_sel_i", 2),
            PortDecl::output("audio_ready_o", 1),
            PortDecl::output("sample_count_o", 32),
            PortDecl::output("checksum_o", 16),
            PortDecl::output("done_o", 1),
        ]);
        Self {
            ports,
            edge: EdgeDetector::default(),
            samples: 0,
            checksum: 0,
            finish_after,
            finalized: false,
        }
    }

    /// Samples accepted so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Running checksum of accepted samples.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Whether [`finalize`](SignalInterface::finalize) has run.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn check_mode_selects(&self) -> Result<(), ModelError> {
        let bitrate = self.ports.get(Self::BITRATE_SEL);
        if bitrate > Self::MAX_BITRATE_SEL {
            return Err(ModelError::new(format!(
                "bitrate select {bitrate} is out of range 0..={}",
                Self::MAX_BITRATE_SEL
            )));
        }
        let bandwidth = self.ports.get(Self::BANDWIDTH_SEL);
        if bandwidth > Self::MAX_BANDWIDTH_SEL {
            return Err(ModelError::new(format!(
                "bandwidth select {bandwidth} is reserved"
            )));
        }
        Ok(())
    }
}

impl SignalInterface for StreamModel {
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
        let in_reset = self.ports.get(Self::RESET_N) == 0;
        let ready = !in_reset && self.ports.get(Self::FRAME_READY) == 1;

        if self.edge.rising(self.ports.get(Self::CLK)) {
            if in_reset {
                self.samples = 0;
                self.checksum = 0;
            } else {
                self.check_mode_selects()?;
                if ready && self.ports.get(Self::AUDIO_VALID) == 1 && !self.is_finished() {
                    let sample = self.ports.get(Self::AUDIO_DATA) as u16;
                    self.checksum = self.checksum.rotate_left(1) ^ sample;
                    self.samples += 1;
                }
            }
        }

        self.ports.drive(Self::AUDIO_READY_OUT, u64::from(ready));
        self.ports.drive(Self::SAMPLE_COUNT, self.samples);
        self.ports.drive(Self::CHECKSUM, u64::from(self.checksum));
        self.ports.drive(Self::DONE, u64::from(self.is_finished()));
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ModelError> {
        self.finalized = true;
        tracing::debug!(
            samples = self.samples,
            checksum = format_args!("{:#06x}", self.checksum),
            "stream model finalized"
        );
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finish_after.is_some_and(|n| self.samples >= n)
    }
}
