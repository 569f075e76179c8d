use super::{value_to_string, Filter};
use crate::config::FilterConfig;
use crate::core::Message;
use async_trait::async_trait;
use std::collections::HashMap;

/// Forwards the message iff every configured `field` is present and equals
/// the configured `value` — an allowlist filter. Empty options is a
/// construction error.
pub struct PayloadEqualFilter {
    expected: HashMap<String, String>,
}

impl PayloadEqualFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        if cfg.options.is_empty() {
            anyhow::bail!("payload_equal filter '{}': requires at least one field=value option", cfg.name);
        }
        let expected = cfg.options.iter().map(|(k, v)| (k.clone(), value_to_string(v))).collect();
        Ok(Self { expected })
    }
}

#[async_trait]
impl Filter for PayloadEqualFilter {
    async fn process(&mut self, msg: Message) -> anyhow::Result<Option<Message>> {
        for (field, expected) in &self.expected {
            match msg.payload.get(field) {
                Some(actual) if actual == expected => {}
                _ => return Ok(None),
            }
        }
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_exact_match_passes() {
        let options = [("env".to_string(), serde_json::json!("prod"))].into_iter().collect();
        let mut f = PayloadEqualFilter::new(&FilterConfig {
            name: "eq1".into(),
            plugin: "payload_equal".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: false,
            options,
        })
        .unwrap();

        let mut matching = Message::new("h", "c");
        matching.payload.insert("env".into(), "prod".into());
        assert!(f.process(matching).await.unwrap().is_some());

        let mut mismatching = Message::new("h", "c");
        mismatching.payload.insert("env".into(), "dev".into());
        assert!(f.process(mismatching).await.unwrap().is_none());
    }

    #[test]
    fn empty_options_rejected() {
        assert!(PayloadEqualFilter::new(&FilterConfig {
            name: "eq2".into(),
            plugin: "payload_equal".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: false,
            options: Default::default(),
        })
        .is_err());
    }
}
