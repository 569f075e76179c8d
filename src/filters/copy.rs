use super::{value_to_string, Filter};
use crate::config::FilterConfig;
use crate::core::Message;
use async_trait::async_trait;
use std::collections::HashMap;

/// For each configured `from -> to`: if `from` exists in payload, sets
/// `payload[to] = payload[from]`. `from` absent is silently skipped.
pub struct CopyFilter {
    mapping: HashMap<String, String>,
}

impl CopyFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        if cfg.options.is_empty() {
            anyhow::bail!("copy filter '{}': requires at least one from=to option", cfg.name);
        }
        let mapping = cfg.options.iter().map(|(k, v)| (k.clone(), value_to_string(v))).collect();
        Ok(Self { mapping })
    }
}

#[async_trait]
impl Filter for CopyFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        for (from, to) in &self.mapping {
            if let Some(value) = msg.payload.get(from).cloned() {
                msg.payload.insert(to.clone(), value);
            }
        }
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_filter(mapping: &[(&str, &str)]) -> CopyFilter {
        let options = mapping.iter().map(|(f, t)| (f.to_string(), serde_json::json!(t))).collect();
        CopyFilter::new(&FilterConfig {
            name: "copy1".into(),
            plugin: "copy".into(),
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
    async fn copy_preserves_source_field() {
        let mut filter = make_filter(&[("a", "b")]);
        let mut msg = Message::new("h", "c");
        msg.payload.insert("a".into(), "value".into());

        let out = filter.process(msg).await.unwrap().unwrap();
        assert_eq!(out.payload.get("a").unwrap(), "value");
        assert_eq!(out.payload.get("b").unwrap(), "value");
    }

    #[tokio::test]
    async fn missing_source_is_silently_skipped() {
        let mut filter = make_filter(&[("missing", "b")]);
        let msg = Message::new("h", "c");
        let out = filter.process(msg).await.unwrap().unwrap();
        assert!(!out.payload.contains_key("b"));
    }
}
