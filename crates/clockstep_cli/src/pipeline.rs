//! Shared configuration resolution for the `run` and `check` commands.

use std::path::Path;

use clockstep_config::{apply_overrides, load_config, preset, Override, RunConfig};

use crate::RunArgs;

/// Configuration file picked up from the working directory when neither
/// `--config` nor `--preset` is given.
pub const DEFAULT_CONFIG_FILE: &str = "clockstep.toml";

/// Resolves the base configuration and applies `--set` overrides and plusargs.
pub fn resolve_config(args: &RunArgs) -> Result<RunConfig, Box<dyn std::error::Error>> {
    resolve_config_in(args, Path::new("."))
}

/// Like [`resolve_config`], looking for the default file under `dir`.
pub fn resolve_config_in(
    args: &RunArgs,
    dir: &Path,
) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let mut config = match (&args.config, &args.preset) {
        (Some(path), _) => load_config(path)?,
        (None, Some(name)) => preset(name)?,
        (None, None) => {
            let default_path = dir.join(DEFAULT_CONFIG_FILE);
            if default_path.is_file() {
                load_config(&default_path)?
            } else {
                RunConfig::default()
            }
        }
    };

    let overrides = args
        .set
        .iter()
        .chain(&args.plusargs)
        .map(|arg| Override::parse(arg))
        .collect::<Result<Vec<_>, _>>()?;
    apply_overrides(&mut config, &overrides)?;
    Ok(config)
}
