//! `clockstep presets`: list the built-in configurations.

use clockstep_config::{preset_description, PRESET_NAMES};

use crate::{GlobalArgs, ReportFormat};

/// Prints every preset name with its description.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    match global.format {
        ReportFormat::Json => {
            let list: Vec<_> = PRESET_NAMES
                .iter()
                .map(|name| {
                    serde_json::json!({
                        "name": name,
                        "description": preset_description(name),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        ReportFormat::Text => {
            let width = PRESET_NAMES.iter().map(|n| n.len()).max().unwrap_or(0);
            for name in PRESET_NAMES {
                println!(
                    "{name:<width$}  {}",
                    preset_description(name).unwrap_or_default()
                );
            }
        }
    }
    Ok(0)
}
