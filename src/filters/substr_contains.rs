use super::Filter;
use crate::config::{require_str, FilterConfig};
use crate::core::Message;
use async_trait::async_trait;

/// On a literal substring hit in `payload[field]`, sets
/// `payload[target_field] := target_value`.
pub struct SubstrContainsFilter {
    field: String,
    substring: String,
    target_field: String,
    target_value: String,
}

impl SubstrContainsFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        let substring = require_str(&cfg.options, "substr_contains", &cfg.name, "substring")?.to_string();
        let target_field = require_str(&cfg.options, "substr_contains", &cfg.name, "target_field")?.to_string();
        let target_value = require_str(&cfg.options, "substr_contains", &cfg.name, "target_value")?.to_string();
        Ok(Self { field: cfg.field.clone(), substring, target_field, target_value })
    }
}

#[async_trait]
impl Filter for SubstrContainsFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        let Some(value) = msg.payload.get(&self.field) else {
            return Ok(Some(msg));
        };
        if value.contains(&self.substring) {
            msg.payload.insert(self.target_field.clone(), self.target_value.clone());
        }
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn contains_hit_sets_target_field() {
        let options = [
            ("substring".to_string(), serde_json::json!("timeout")),
            ("target_field".to_string(), serde_json::json!("flag")),
            ("target_value".to_string(), serde_json::json!("slow")),
        ]
        .into_iter()
        .collect();
        let mut f = SubstrContainsFilter::new(&FilterConfig {
            name: "sc1".into(),
            plugin: "substr_contains".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: false,
            options,
        })
        .unwrap();

        let out = f.process(Message::new("h", "request timeout after 30s")).await.unwrap().unwrap();
        assert_eq!(out.payload.get("flag").unwrap(), "slow");

        let out = f.process(Message::new("h", "all good")).await.unwrap().unwrap();
        assert!(!out.payload.contains_key("flag"));
    }
}
