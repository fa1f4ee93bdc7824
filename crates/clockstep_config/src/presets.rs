//! Built-in run configurations.
//!
//! Each preset is a TOML document parsed through the normal loader, so presets
//! and user files share one validation path.

use crate::error::ConfigError;
use crate::loader::load_config_from_str;
use crate::types::RunConfig;

/// Short bounded run with two sample bursts and fixed mode selects.
const FORMAL: &str = r#"
[run]
name = "formal"
reset_hold_cycles = 5
cycle_budget = 200

[trace]
output = "formal_testbench.vcd"

[inputs]
audio_ready_i = 1
frame_bus_ready_i = 1
frame_ready_i = 1
packet_ready_i = 1
encode_mode_i = 1
bitrate_sel_i = 5
bandwidth_sel_i = 1

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
increment = 1

[model]
kind = "stream"
"#;

/// Long idle run with no stimulus; ends on the budget or on model completion.
const SMOKE: &str = r#"
[run]
name = "smoke"
reset_hold_cycles = 10
cycle_budget = 10000

[trace]
output = "tb_mlow_codec_verilator.vcd"

[inputs]
frame_ready_i = 1

[model]
kind = "stream"
"#;

/// One full frame of samples; the model finishes once the frame is consumed.
const COMPREHENSIVE: &str = r#"
[run]
name = "comprehensive"
reset_hold_cycles = 10
cycle_budget = 50000

[trace]
output = "tb_mlow_codec_comprehensive.vcd"

[inputs]
audio_ready_i = 1
frame_bus_ready_i = 1
frame_ready_i = 1
packet_ready_i = 1
encode_mode_i = 1
bitrate_sel_i = 7
bandwidth_sel_i = 2

[[stimulus]]
input = "audio_data_i"
valid = "audio_valid_i"
start = 16
end = 496
base = 0
increment = 0x45

[model]
kind = "stream"
finish_after = 480
"#;

/// Names of every built-in preset, in display order.
pub const PRESET_NAMES: &[&str] = &["formal", "smoke", "comprehensive"];

/// Returns a short description of a preset.
pub fn preset_description(name: &str) -> Option<&'static str> {
    match name {
        "formal" => Some("200 cycles, two 16-sample bursts at 0x1234 and 0x5678"),
        "smoke" => Some("up to 10000 idle cycles after a 10-cycle reset"),
        "comprehensive" => Some("one 480-sample frame, stops when the model finishes"),
        _ => None,
    }
}

/// Loads a built-in preset by name.
pub fn preset(name: &str) -> Result<RunConfig, ConfigError> {
    let source = match name {
        "formal" => FORMAL,
        "smoke" => SMOKE,
        "comprehensive" => COMPREHENSIVE,
        other => return Err(ConfigError::UnknownPreset(other.to_string())),
    };
    load_config_from_str(source)
}
