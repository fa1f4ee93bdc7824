//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::RunConfig;
use std::path::Path;

/// Loads and validates a run configuration file.
pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a run configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<RunConfig, ConfigError> {
    let config: RunConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks everything that can be checked without a model.
///
/// Port existence is checked later, when the configuration is bound to a model.
pub fn validate_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.run.name.is_empty() {
        return Err(ConfigError::MissingField("run.name".to_string()));
    }
    if config.run.reset_hold_cycles == 0 {
        return Err(ConfigError::ValidationError(
            "run.reset_hold_cycles must be at least 1".to_string(),
        ));
    }
    if config.ports.clock.is_empty() {
        return Err(ConfigError::MissingField("ports.clock".to_string()));
    }
    if config.ports.reset.is_empty() {
        return Err(ConfigError::MissingField("ports.reset".to_string()));
    }
    if config.ports.clock == config.ports.reset {
        return Err(ConfigError::ValidationError(format!(
            "clock and reset are both bound to '{}'",
            config.ports.clock
        )));
    }
    if config.trace.enabled && config.trace_output().is_empty() {
        return Err(ConfigError::MissingField("trace.output".to_string()));
    }
    validate_timescale(&config.trace.timescale)?;
    validate_stimulus(config)
}

/// Accepts the VCD timescales `1`, `10` or `100` of `s`, `ms`, `us`, `ns`, `ps`, `fs`.
fn validate_timescale(timescale: &str) -> Result<(), ConfigError> {
    let digits_end = timescale
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(timescale.len());
    let (magnitude, unit) = timescale.split_at(digits_end);
    let magnitude_ok = matches!(magnitude, "1" | "10" | "100");
    let unit_ok = matches!(unit.trim(), "s" | "ms" | "us" | "ns" | "ps" | "fs");
    if magnitude_ok && unit_ok {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "invalid trace.timescale '{timescale}'"
        )))
    }
}

fn validate_stimulus(config: &RunConfig) -> Result<(), ConfigError> {
    let driver_ports = [config.ports.clock.as_str(), config.ports.reset.as_str()];

    for window in &config.stimulus {
        if window.input.is_empty() {
            return Err(ConfigError::MissingField("stimulus.input".to_string()));
        }
        if window.start >= window.end {
            return Err(ConfigError::ValidationError(format!(
                "stimulus window on '{}' is empty: [{}, {})",
                window.input, window.start, window.end
            )));
        }
        let driven = std::iter::once(window.input.as_str()).chain(window.valid.as_deref());
        for port in driven {
            if driver_ports.contains(&port) {
                return Err(ConfigError::ValidationError(format!(
                    "stimulus may not drive '{port}', it is owned by the clock/reset driver"
                )));
            }
        }
        if window.valid.as_deref() == Some(window.input.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "stimulus window on '{}' uses its data input as the valid line",
                window.input
            )));
        }
    }

    for (i, first) in config.stimulus.iter().enumerate() {
        for second in &config.stimulus[i + 1..] {
            if first.input != second.input {
                if second.valid.as_deref() == Some(first.input.as_str())
                    || first.valid.as_deref() == Some(second.input.as_str())
                {
                    return Err(ConfigError::ValidationError(format!(
                        "'{}' and '{}' use each other as valid lines",
                        first.input, second.input
                    )));
                }
                if first.valid.is_some() && first.valid == second.valid {
                    return Err(ConfigError::ValidationError(format!(
                        "'{}' and '{}' share the valid line '{}'",
                        first.input,
                        second.input,
                        second.valid.as_deref().unwrap_or_default()
                    )));
                }
                continue;
            }
            if first.valid != second.valid {
                return Err(ConfigError::ValidationError(format!(
                    "stimulus windows on '{}' name different valid lines",
                    first.input
                )));
            }
            if first.overlaps(second) {
                return Err(ConfigError::OverlappingWindows {
                    input: first.input.clone(),
                    first_start: first.start,
                    first_end: first.end,
                    second_start: second.start,
                    second_end: second.end,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CycleBudget;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.run.name, "run");
        assert_eq!(config.run.reset_hold_cycles, 5);
        assert_eq!(config.run.cycle_budget, CycleBudget::Cycles(10_000));
        assert_eq!(config.ports.clock, "clk_i");
        assert_eq!(config.ports.reset, "reset_n_i");
        assert!(config.ports.reset_active_low);
        assert!(config.trace.enabled);
        assert_eq!(config.trace.timescale, "1ns");
        assert_eq!(config.model.kind, "counter");
        assert!(config.stimulus.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[run]
name = "formal"
reset_hold_cycles = 5
cycle_budget = 200

[ports]
clock = "clk_i"
reset = "reset_n_i"
reset_active_low = true

[trace]
output = "formal_testbench.vcd"
timescale = "10ns"

[inputs]
audio_ready_i = 1
bitrate_sel_i = 5

[[stimulus]]
input = "audio_data_i"
valid = "audio_valid_i"
start = 10
end = 26
base = 0x1234
increment = 1

[[stimulus]]
input = "audio_data_i"
valid = "audio_valid_i"
start = 50
end = 66
base = 0x5678

[model]
kind = "stream"
finish_after = 32
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.run.name, "formal");
        assert_eq!(config.run.cycle_budget, CycleBudget::Cycles(200));
        assert_eq!(config.trace_output(), "formal_testbench.vcd");
        assert_eq!(config.inputs["bitrate_sel_i"], 5);
        assert_eq!(config.stimulus.len(), 2);
        assert_eq!(config.stimulus[0].base, 0x1234);
        assert_eq!(config.stimulus[1].increment, 1);
        assert_eq!(config.model.kind, "stream");
        assert_eq!(config.model.param("finish_after"), Some(32));
    }

    #[test]
    fn until_finished_budget() {
        let config = load_config_from_str("[run]\ncycle_budget = \"until-finished\"").unwrap();
        assert_eq!(config.run.cycle_budget, CycleBudget::UntilFinished);
    }

    #[test]
    fn negative_budget_errors() {
        let err = load_config_from_str("[run]\ncycle_budget = -1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn zero_reset_hold_errors() {
        let err = load_config_from_str("[run]\nreset_hold_cycles = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn empty_name_errors() {
        let err = load_config_from_str("[run]\nname = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn overlapping_windows_rejected() {
        let toml = r#"
[[stimulus]]
input = "audio_data_i"
start = 10
end = 26

[[stimulus]]
input = "audio_data_i"
start = 20
end = 30
"#;
        let err = load_config_from_str(toml).unwrap_err();
        match err {
            ConfigError::OverlappingWindows {
                input,
                first_start,
                second_start,
                ..
            } => {
                assert_eq!(input, "audio_data_i");
                assert_eq!(first_start, 10);
                assert_eq!(second_start, 20);
            }
            other => panic!("expected OverlappingWindows, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_windows_on_different_inputs_allowed() {
        let toml = r#"
[[stimulus]]
input = "a"
start = 10
end = 26

[[stimulus]]
input = "b"
start = 20
end = 30
"#;
        assert!(load_config_from_str(toml).is_ok());
    }

    #[test]
    fn adjacent_windows_allowed() {
        let toml = r#"
[[stimulus]]
input = "a"
start = 10
end = 20

[[stimulus]]
input = "a"
start = 20
end = 30
"#;
        assert!(load_config_from_str(toml).is_ok());
    }

    #[test]
    fn empty_window_rejected() {
        let toml = "[[stimulus]]\ninput = \"a\"\nstart = 5\nend = 5\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn mismatched_valid_lines_rejected() {
        let toml = r#"
[[stimulus]]
input = "a"
valid = "a_valid"
start = 0
end = 4

[[stimulus]]
input = "a"
valid = "other_valid"
start = 10
end = 14
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn stimulus_on_clock_rejected() {
        let toml = "[[stimulus]]\ninput = \"clk_i\"\nstart = 0\nend = 4\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn clock_equal_reset_rejected() {
        let err = load_config_from_str("[ports]\nclock = \"x\"\nreset = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn timescale_validation() {
        for ok in ["1ns", "10ps", "100us", "1s", "1 ns"] {
            assert!(validate_timescale(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["2ns", "1hz", "ns", ""] {
            assert!(validate_timescale(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn io_error_from_nonexistent_file() {
        let err = load_config(Path::new("/nonexistent/dir/run.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "[run]\nname = \"from_file\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.run.name, "from_file");
    }
}
