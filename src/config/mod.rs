pub mod loader;
pub mod types;
pub mod validation;

pub use loader::load_config;
pub use types::{Config, FilterConfig, GlobalConfig, InputConfig, OutputConfig, Options};
pub use validation::validate;

/// Reads option maps the way every plugin constructor does: pull a required
/// key out of the untyped `options` bag, or fail construction with a message
/// naming the plugin, stage, and missing option.
pub fn require_str<'a>(options: &'a Options, plugin: &str, stage: &str, key: &'static str) -> anyhow::Result<&'a str> {
    options
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| crate::error::ConfigError::MissingOption {
            plugin: plugin.to_string(),
            stage: stage.to_string(),
            option: key,
        }.into())
}

pub fn optional_str(options: &Options, key: &str) -> Option<String> {
    options.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

pub fn optional_u64(options: &Options, key: &str) -> Option<u64> {
    options.get(key).and_then(|v| v.as_u64())
}

pub fn optional_bool(options: &Options, key: &str) -> Option<bool> {
    options.get(key).and_then(|v| v.as_bool())
}

pub fn optional_f64(options: &Options, key: &str) -> Option<f64> {
    options.get(key).and_then(|v| v.as_f64())
}
