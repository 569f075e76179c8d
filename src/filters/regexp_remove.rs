use super::Filter;
use crate::config::FilterConfig;
use crate::core::Message;
use async_trait::async_trait;
use regex::Regex;

/// Drops the message if any configured pattern matches `payload[field]`.
pub struct RegexpRemoveFilter {
    field: String,
    patterns: Vec<Regex>,
}

impl RegexpRemoveFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        if cfg.options.is_empty() {
            anyhow::bail!("regexp_remove filter '{}': requires at least one pattern option", cfg.name);
        }
        let mut patterns = Vec::new();
        for (name, value) in &cfg.options {
            let pattern = value.as_str().ok_or_else(|| {
                anyhow::anyhow!("regexp_remove filter '{}': pattern '{}' is not a string", cfg.name, name)
            })?;
            patterns.push(
                Regex::new(pattern)
                    .map_err(|e| anyhow::anyhow!("regexp_remove filter '{}': invalid pattern '{}': {}", cfg.name, name, e))?,
            );
        }
        Ok(Self { field: cfg.field.clone(), patterns })
    }
}

#[async_trait]
impl Filter for RegexpRemoveFilter {
    async fn process(&mut self, msg: Message) -> anyhow::Result<Option<Message>> {
        let Some(value) = msg.payload.get(&self.field) else {
            return Ok(Some(msg));
        };
        if self.patterns.iter().any(|p| p.is_match(value)) {
            return Ok(None);
        }
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matching_pattern_drops_the_message() {
        let options = [("noisy".to_string(), serde_json::json!("^DEBUG"))].into_iter().collect();
        let mut f = RegexpRemoveFilter::new(&FilterConfig {
            name: "rr1".into(),
            plugin: "regexp_remove".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: false,
            options,
        })
        .unwrap();

        assert!(f.process(Message::new("h", "DEBUG noise")).await.unwrap().is_none());
        assert!(f.process(Message::new("h", "INFO fine")).await.unwrap().is_some());
    }
}
