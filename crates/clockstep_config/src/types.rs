//! Configuration types deserialized from a run configuration TOML file.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reset hold length used when `run.reset_hold_cycles` is not given.
pub const DEFAULT_RESET_HOLD_CYCLES: u64 = 5;

/// Cycle budget used when `run.cycle_budget` is not given.
pub const DEFAULT_CYCLE_BUDGET: u64 = 10_000;

/// The complete, immutable description of one simulation run.
///
/// Every section carries defaults, so an empty document is a valid
/// configuration for the `counter` model.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RunConfig {
    /// Run name, reset length and termination policy.
    #[serde(default)]
    pub run: RunSection,
    /// Which ports carry the clock and reset.
    #[serde(default)]
    pub ports: PortBindings,
    /// Waveform trace settings.
    #[serde(default)]
    pub trace: TraceConfig,
    /// Idle values for inputs, keyed by port name. Unlisted inputs take the
    /// model's own idle value.
    #[serde(default)]
    pub inputs: BTreeMap<String, u64>,
    /// Stimulus windows, in declaration order.
    #[serde(default)]
    pub stimulus: Vec<StimulusWindow>,
    /// Model selection and its parameters.
    #[serde(default)]
    pub model: ModelConfig,
}

impl RunConfig {
    /// Returns the trace output name, falling back to `<run.name>.vcd`
    /// (or `.vcd.gz` when compression is on).
    pub fn trace_output(&self) -> String {
        match &self.trace.output {
            Some(output) => output.clone(),
            None if self.trace.compress => format!("{}.vcd.gz", self.run.name),
            None => format!("{}.vcd", self.run.name),
        }
    }
}

/// The `[run]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RunSection {
    /// Human-readable run name, also the default trace file stem.
    #[serde(default = "default_run_name")]
    pub name: String,
    /// Number of clock cycles the reset line is held asserted.
    #[serde(default = "default_reset_hold")]
    pub reset_hold_cycles: u64,
    /// How many cycles to run after reset.
    #[serde(default)]
    pub cycle_budget: CycleBudget,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            name: default_run_name(),
            reset_hold_cycles: DEFAULT_RESET_HOLD_CYCLES,
            cycle_budget: CycleBudget::default(),
        }
    }
}

fn default_run_name() -> String {
    "run".to_string()
}

fn default_reset_hold() -> u64 {
    DEFAULT_RESET_HOLD_CYCLES
}

/// Termination policy for the main phase of a run.
///
/// Model-signalled completion always ends the run early; this only bounds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleBudget {
    /// Stop after this many cycles.
    Cycles(u64),
    /// Run until the model reports completion, however long that takes.
    UntilFinished,
}

impl CycleBudget {
    /// Returns the cycle limit, or `None` when unbounded.
    pub fn limit(self) -> Option<u64> {
        match self {
            CycleBudget::Cycles(n) => Some(n),
            CycleBudget::UntilFinished => None,
        }
    }
}

impl Default for CycleBudget {
    fn default() -> Self {
        CycleBudget::Cycles(DEFAULT_CYCLE_BUDGET)
    }
}

impl fmt::Display for CycleBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleBudget::Cycles(n) => write!(f, "{n}"),
            CycleBudget::UntilFinished => f.write_str(UNTIL_FINISHED),
        }
    }
}

const UNTIL_FINISHED: &str = "until-finished";

impl std::str::FromStr for CycleBudget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == UNTIL_FINISHED {
            return Ok(CycleBudget::UntilFinished);
        }
        parse_int(s)
            .map(CycleBudget::Cycles)
            .ok_or_else(|| format!("expected a cycle count or \"{UNTIL_FINISHED}\", got '{s}'"))
    }
}

/// Accepts `cycle_budget = 200` as well as `cycle_budget = "until-finished"`.
impl<'de> Deserialize<'de> for CycleBudget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BudgetVisitor;

        impl<'de> Visitor<'de> for BudgetVisitor {
            type Value = CycleBudget;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a non-negative cycle count or \"until-finished\"")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(CycleBudget::Cycles)
                    .map_err(|_| E::custom(format!("cycle budget must not be negative, got {v}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(CycleBudget::Cycles(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(BudgetVisitor)
    }
}

/// The `[ports]` section: which model ports the driver owns.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PortBindings {
    /// The clock input toggled by the clock sequencer.
    #[serde(default = "default_clock_port")]
    pub clock: String,
    /// The reset input held by the reset controller.
    #[serde(default = "default_reset_port")]
    pub reset: String,
    /// Whether reset is asserted by driving the line low.
    #[serde(default = "default_true")]
    pub reset_active_low: bool,
}

impl PortBindings {
    /// Line level that asserts reset.
    pub fn reset_asserted_level(&self) -> u64 {
        if self.reset_active_low { 0 } else { 1 }
    }

    /// Line level that releases reset.
    pub fn reset_released_level(&self) -> u64 {
        1 - self.reset_asserted_level()
    }
}

impl Default for PortBindings {
    fn default() -> Self {
        Self {
            clock: default_clock_port(),
            reset: default_reset_port(),
            reset_active_low: true,
        }
    }
}

fn default_clock_port() -> String {
    "clk_i".to_string()
}

fn default_reset_port() -> String {
    "reset_n_i".to_string()
}

fn default_true() -> bool {
    true
}

/// The `[trace]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TraceConfig {
    /// Whether a waveform is written at all. Scoped to this run only.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Output path. Defaults to `<run.name>.vcd`.
    #[serde(default)]
    pub output: Option<String>,
    /// VCD `$timescale` for one virtual timestamp step (half a clock period).
    #[serde(default = "default_timescale")]
    pub timescale: String,
    /// Gzip-compress the trace as it is written.
    #[serde(default)]
    pub compress: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output: None,
            timescale: default_timescale(),
            compress: false,
        }
    }
}

fn default_timescale() -> String {
    "1ns".to_string()
}

/// One `[[stimulus]]` entry: drive `input` during `[start, end)`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StimulusWindow {
    /// Data input driven with the computed value.
    pub input: String,
    /// Optional valid line raised while the window is active.
    #[serde(default)]
    pub valid: Option<String>,
    /// First cycle of the window (inclusive).
    pub start: u64,
    /// End of the window (exclusive).
    pub end: u64,
    /// Value driven on the first cycle.
    #[serde(default)]
    pub base: u64,
    /// Amount added per cycle after `start`.
    #[serde(default = "default_increment")]
    pub increment: u64,
}

impl StimulusWindow {
    /// Whether `cycle` falls inside `[start, end)`.
    pub fn contains(&self, cycle: u64) -> bool {
        self.start <= cycle && cycle < self.end
    }

    /// Whether two windows share at least one cycle.
    pub fn overlaps(&self, other: &StimulusWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

fn default_increment() -> u64 {
    1
}

/// The `[model]` section: a model kind plus free-form integer parameters.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    /// Name of the built-in model to instantiate.
    #[serde(default = "default_model_kind")]
    pub kind: String,
    /// Model-specific parameters such as `finish_after`.
    #[serde(flatten)]
    pub params: BTreeMap<String, u64>,
}

impl ModelConfig {
    /// Looks up an integer parameter.
    pub fn param(&self, key: &str) -> Option<u64> {
        self.params.get(key).copied()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: default_model_kind(),
            params: BTreeMap::new(),
        }
    }
}

fn default_model_kind() -> String {
    "counter".to_string()
}

/// Parses a decimal, `0x` hex, or `0b` binary integer, allowing `_` separators.
pub(crate) fn parse_int(s: &str) -> Option<u64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != '_').collect();
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()
    } else {
        cleaned.parse().ok()
    }
}
