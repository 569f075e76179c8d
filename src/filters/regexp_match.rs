use super::Filter;
use crate::config::{optional_str, require_str, FilterConfig};
use crate::core::Message;
use async_trait::async_trait;
use regex::Regex;

/// A single pattern; on match, sets `payload[target_field] := target_value`.
/// Only `action = "set"` is supported, rejected at construction otherwise.
pub struct RegexpMatchFilter {
    field: String,
    pattern: Regex,
    target_field: String,
    target_value: String,
}

impl RegexpMatchFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        let pattern_str = require_str(&cfg.options, "regexp_match", &cfg.name, "pattern")?;
        let pattern = Regex::new(pattern_str)
            .map_err(|e| anyhow::anyhow!("regexp_match filter '{}': invalid pattern: {}", cfg.name, e))?;

        let action = optional_str(&cfg.options, "action").unwrap_or_else(|| "set".to_string());
        if action != "set" {
            anyhow::bail!("regexp_match filter '{}': unsupported action '{}', only 'set' is supported", cfg.name, action);
        }

        let target_field = require_str(&cfg.options, "regexp_match", &cfg.name, "target_field")?.to_string();
        let target_value = require_str(&cfg.options, "regexp_match", &cfg.name, "target_value")?.to_string();

        Ok(Self { field: cfg.field.clone(), pattern, target_field, target_value })
    }
}

#[async_trait]
impl Filter for RegexpMatchFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        let Some(value) = msg.payload.get(&self.field) else {
            return Ok(Some(msg));
        };
        if self.pattern.is_match(value) {
            msg.payload.insert(self.target_field.clone(), self.target_value.clone());
        }
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> RegexpMatchFilter {
        let options = [
            ("pattern".to_string(), serde_json::json!("^ERROR")),
            ("target_field".to_string(), serde_json::json!("severity")),
            ("target_value".to_string(), serde_json::json!("error")),
        ]
        .into_iter()
        .collect();
        RegexpMatchFilter::new(&FilterConfig {
            name: "rm1".into(),
            plugin: "regexp_match".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: false,
            options,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn match_sets_the_target_field() {
        let mut f = filter();
        let out = f.process(Message::new("h", "ERROR disk full")).await.unwrap().unwrap();
        assert_eq!(out.payload.get("severity").unwrap(), "error");
    }

    #[test]
    fn non_set_action_is_rejected_at_construction() {
        let options = [
            ("pattern".to_string(), serde_json::json!("^ERROR")),
            ("action".to_string(), serde_json::json!("drop")),
            ("target_field".to_string(), serde_json::json!("severity")),
            ("target_value".to_string(), serde_json::json!("error")),
        ]
        .into_iter()
        .collect();
        assert!(RegexpMatchFilter::new(&FilterConfig {
            name: "rm2".into(),
            plugin: "regexp_match".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: false,
            options,
        })
        .is_err());
    }
}
