use super::{value_to_string, Filter};
use crate::config::FilterConfig;
use crate::core::Message;
use async_trait::async_trait;
use std::collections::HashMap;

/// For each configured `from -> to`: if `from` exists, sets
/// `payload[to] = payload[from]` then deletes `payload[from]`.
pub struct RenameFilter {
    mapping: HashMap<String, String>,
}

impl RenameFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        if cfg.options.is_empty() {
            anyhow::bail!("rename filter '{}': requires at least one from=to option", cfg.name);
        }
        let mapping = cfg.options.iter().map(|(k, v)| (k.clone(), value_to_string(v))).collect();
        Ok(Self { mapping })
    }
}

#[async_trait]
impl Filter for RenameFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        for (from, to) in &self.mapping {
            if let Some(value) = msg.payload.remove(from) {
                msg.payload.insert(to.clone(), value);
            }
        }
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rename_moves_the_value_and_removes_the_source() {
        let options = [("old".to_string(), serde_json::json!("new"))].into_iter().collect();
        let mut filter = RenameFilter::new(&FilterConfig {
            name: "rename1".into(),
            plugin: "rename".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: false,
            options,
        })
        .unwrap();

        let mut msg = Message::new("h", "c");
        msg.payload.insert("old".into(), "x".into());
        let out = filter.process(msg).await.unwrap().unwrap();

        assert_eq!(out.payload.get("new").unwrap(), "x");
        assert!(!out.payload.contains_key("old"));
    }
}
