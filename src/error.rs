//! Configuration and construction error taxonomy.
//!
//! Transient I/O and per-message errors are handled inline with `tracing` and
//! never reach this type; `ConfigError` is reserved for the fatal, startup-time
//! failures described in the error handling design: unknown plugin kinds,
//! missing required options, and malformed option values.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown {kind} plugin '{name}'")]
    UnknownPlugin { kind: &'static str, name: String },

    #[error("{plugin} '{stage}': missing required option '{option}'")]
    MissingOption {
        plugin: String,
        stage: String,
        option: &'static str,
    },

    #[error("{plugin} '{stage}': invalid value for option '{option}': {reason}")]
    InvalidOption {
        plugin: String,
        stage: String,
        option: &'static str,
        reason: String,
    },

    #[error("{plugin} '{stage}': invalid regular expression '{pattern}': {source}")]
    InvalidRegexp {
        plugin: String,
        stage: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no filters and no pipelines configured")]
    EmptyPipeline,
}
