use super::Filter;
use crate::config::{optional_u64, FilterConfig};
use crate::core::Message;
use async_trait::async_trait;

/// Writes `payload[field] := payload[field][start : start+length]` using
/// byte-slice semantics. Missing field is forwarded unchanged. Out-of-range
/// indices are a caller/configuration error, not defensively handled: the
/// worker returns `Err` and terminates, per the documented hazard (the
/// original never bounds-checks this either).
pub struct SubstringFilter {
    field: String,
    start: usize,
    length: usize,
}

impl SubstringFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        let start = optional_u64(&cfg.options, "start")
            .ok_or_else(|| anyhow::anyhow!("substring filter '{}': missing required option 'start'", cfg.name))?
            as usize;
        let length = optional_u64(&cfg.options, "length")
            .ok_or_else(|| anyhow::anyhow!("substring filter '{}': missing required option 'length'", cfg.name))?
            as usize;
        Ok(Self { field: cfg.field.clone(), start, length })
    }
}

#[async_trait]
impl Filter for SubstringFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        let Some(value) = msg.payload.get(&self.field) else {
            return Ok(Some(msg));
        };
        let bytes = value.as_bytes();
        let end = self.start + self.length;
        if end > bytes.len() {
            anyhow::bail!(
                "substring out of range: field '{}' is {} bytes, requested [{}:{}]",
                self.field,
                bytes.len(),
                self.start,
                end
            );
        }
        let sliced = String::from_utf8_lossy(&bytes[self.start..end]).into_owned();
        msg.payload.insert(self.field.clone(), sliced);
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(start: u64, length: u64) -> SubstringFilter {
        let options = [
            ("start".to_string(), serde_json::json!(start)),
            ("length".to_string(), serde_json::json!(length)),
        ]
        .into_iter()
        .collect();
        SubstringFilter::new(&FilterConfig {
            name: "sub1".into(),
            plugin: "substring".into(),
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
    async fn slices_the_configured_field() {
        let mut f = filter(2, 3);
        let msg = Message::new("h", "hello world");
        let out = f.process(msg).await.unwrap().unwrap();
        assert_eq!(out.payload.get("content").unwrap(), "llo");
    }

    #[tokio::test]
    async fn out_of_range_is_an_unrecoverable_error() {
        let mut f = filter(0, 100);
        let msg = Message::new("h", "short");
        assert!(f.process(msg).await.is_err());
    }
}
