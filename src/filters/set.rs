use super::{value_to_string, Filter};
use crate::config::FilterConfig;
use crate::core::Message;
use async_trait::async_trait;
use std::collections::HashMap;

/// Overlays a fixed key→value mapping onto every message's payload.
pub struct SetFilter {
    overlay: HashMap<String, String>,
}

impl SetFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        if cfg.options.is_empty() {
            anyhow::bail!("set filter '{}': requires at least one key=value option", cfg.name);
        }
        let overlay = cfg.options.iter().map(|(k, v)| (k.clone(), value_to_string(v))).collect();
        Ok(Self { overlay })
    }
}

#[async_trait]
impl Filter for SetFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        for (k, v) in &self.overlay {
            msg.payload.insert(k.clone(), v.clone());
        }
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn cfg(options: Map<String, serde_json::Value>) -> FilterConfig {
        FilterConfig {
            name: "set1".into(),
            plugin: "set".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: false,
            options,
        }
    }

    #[tokio::test]
    async fn set_is_idempotent() {
        let mut options = Map::new();
        options.insert("env".to_string(), serde_json::json!("prod"));
        let mut filter = SetFilter::new(&cfg(options)).unwrap();

        let msg = Message::new("h", "c");
        let once = filter.process(msg.clone()).await.unwrap().unwrap();
        let twice = filter.process(once.clone()).await.unwrap().unwrap();
        assert_eq!(once.payload.get("env"), twice.payload.get("env"));
        assert_eq!(once.payload.get("env").unwrap(), "prod");
    }

    #[test]
    fn empty_options_rejected_at_construction() {
        assert!(SetFilter::new(&cfg(Map::new())).is_err());
    }
}
