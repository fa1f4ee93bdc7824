//! Command-line `KEY=VALUE` overrides applied on top of a loaded configuration.
//!
//! Overrides are the only way the command line changes a run. They are applied
//! in order and the result is re-validated as a whole.

use crate::error::ConfigError;
use crate::loader::validate_config;
use crate::types::{parse_int, CycleBudget, RunConfig};

/// Plusarg form accepted for the trace output, e.g. `+vcd_file=out.vcd`.
pub const VCD_FILE_PLUSARG: &str = "+vcd_file=";

/// A single parsed override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    /// Dotted configuration key, e.g. `run.cycle_budget`.
    pub key: String,
    /// Raw value text.
    pub value: String,
}

impl Override {
    /// Parses `KEY=VALUE`, or the `+vcd_file=PATH` plusarg.
    pub fn parse(arg: &str) -> Result<Self, ConfigError> {
        if let Some(path) = arg.strip_prefix(VCD_FILE_PLUSARG) {
            return Ok(Self {
                key: "trace.output".to_string(),
                value: path.to_string(),
            });
        }
        let (key, value) = arg.split_once('=').ok_or_else(|| {
            ConfigError::ParseError(format!("expected KEY=VALUE override, got '{arg}'"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::ParseError(format!(
                "override '{arg}' has an empty key"
            )));
        }
        Ok(Self {
            key: key.to_string(),
            value: value.trim().to_string(),
        })
    }
}

/// Applies overrides in order, then re-validates the configuration.
pub fn apply_overrides(config: &mut RunConfig, overrides: &[Override]) -> Result<(), ConfigError> {
    for ov in overrides {
        apply_one(config, ov)?;
    }
    validate_config(config)
}

fn apply_one(config: &mut RunConfig, ov: &Override) -> Result<(), ConfigError> {
    let value = ov.value.as_str();
    match ov.key.as_str() {
        "run.name" => config.run.name = value.to_string(),
        "run.reset_hold_cycles" => config.run.reset_hold_cycles = int_value(ov)?,
        "run.cycle_budget" => {
            config.run.cycle_budget = value
                .parse::<CycleBudget>()
                .map_err(|e| ConfigError::ValidationError(format!("{}: {e}", ov.key)))?;
        }
        "trace.enabled" => config.trace.enabled = bool_value(ov)?,
        "trace.output" => config.trace.output = Some(value.to_string()),
        "trace.timescale" => config.trace.timescale = value.to_string(),
        "trace.compress" => config.trace.compress = bool_value(ov)?,
        "model.kind" => config.model.kind = value.to_string(),
        key => {
            if let Some(port) = key.strip_prefix("inputs.") {
                let level = int_value(ov)?;
                config.inputs.insert(port.to_string(), level);
            } else if let Some(param) = key.strip_prefix("model.") {
                let v = int_value(ov)?;
                config.model.params.insert(param.to_string(), v);
            } else {
                return Err(ConfigError::UnknownKey(key.to_string()));
            }
        }
    }
    Ok(())
}

fn int_value(ov: &Override) -> Result<u64, ConfigError> {
    parse_int(&ov.value).ok_or_else(|| {
        ConfigError::ValidationError(format!("{}: expected an integer, got '{}'", ov.key, ov.value))
    })
}

fn bool_value(ov: &Override) -> Result<bool, ConfigError> {
    match ov.value.as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        other => Err(ConfigError::ValidationError(format!(
            "{}: expected a boolean, got '{other}'",
            ov.key
        ))),
    }
}
