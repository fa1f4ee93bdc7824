//! Error types for run configuration loading and validation.

/// Errors that can occur when loading, overriding, or validating a run configuration.
///
/// Every variant is detected before any simulation work starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Two stimulus windows drive the same input during the same cycle.
    #[error(
        "overlapping stimulus windows on '{input}': [{first_start}, {first_end}) and [{second_start}, {second_end})"
    )]
    OverlappingWindows {
        /// The input both windows drive.
        input: String,
        /// Start of the earlier window.
        first_start: u64,
        /// End of the earlier window.
        first_end: u64,
        /// Start of the later window.
        second_start: u64,
        /// End of the later window.
        second_end: u64,
    },

    /// A configured port name does not exist on the model.
    #[error("unknown port '{0}'")]
    UnknownPort(String),

    /// An override key is not recognized.
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    /// No built-in preset has the given name.
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    /// The trace output location cannot be written.
    #[error("trace output '{path}' is not writable: {reason}")]
    TraceLocation {
        /// The configured trace output path.
        path: String,
        /// Why the location was rejected.
        reason: String,
    },
}
