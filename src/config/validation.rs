//! Structural validation pass, run after parsing and before any stage is
//! constructed: catches unknown plugin kinds up front so a typo doesn't
//! surface halfway through building the graph with half the workers already
//! spawned.

use super::types::Config;
use crate::error::ConfigError;

const INPUT_PLUGINS: &[&str] = &["syslog", "redis"];
const OUTPUT_PLUGINS: &[&str] = &["stdout", "stat", "clickhouse", "redis", "null"];
const FILTER_PLUGINS: &[&str] = &[
    "set",
    "copy",
    "rename",
    "split",
    "substring",
    "regexp",
    "regexp_remove",
    "regexp_match",
    "substr_contains",
    "regexp_classify",
    "payload_assert",
    "payload_equal",
    "payload_dump",
    "geoip",
    "time_format",
    "tcp_tee",
    "web_rpc",
];

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    for input in &config.inputs {
        if !INPUT_PLUGINS.contains(&input.plugin.as_str()) {
            return Err(ConfigError::UnknownPlugin { kind: "input", name: input.plugin.clone() });
        }
    }
    for filter in &config.filters {
        if !FILTER_PLUGINS.contains(&filter.plugin.as_str()) {
            return Err(ConfigError::UnknownPlugin { kind: "filter", name: filter.plugin.clone() });
        }
    }
    for output in &config.outputs {
        if !OUTPUT_PLUGINS.contains(&output.plugin.as_str()) {
            return Err(ConfigError::UnknownPlugin { kind: "output", name: output.plugin.clone() });
        }
    }
    if config.inputs.is_empty() && config.outputs.is_empty() {
        return Err(ConfigError::EmptyPipeline);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::load_config_from_str;

    #[test]
    fn rejects_unknown_filter_plugin() {
        let cfg = load_config_from_str(
            r#"in { input "i" { plugin = "syslog" } }
               filter "f" { plugin = "not_a_real_filter" }
               out { output "o" { plugin = "stdout" } }"#,
        )
        .unwrap();
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlugin { kind: "filter", .. }));
    }

    #[test]
    fn accepts_every_documented_filter_kind() {
        for plugin in FILTER_PLUGINS {
            let hcl = format!(
                r#"in {{ input "i" {{ plugin = "syslog" }} }}
                   filter "f" {{ plugin = "{plugin}" }}
                   out {{ output "o" {{ plugin = "stdout" }} }}"#
            );
            let cfg = load_config_from_str(&hcl).unwrap();
            validate(&cfg).unwrap();
        }
    }
}
