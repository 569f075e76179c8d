use super::Filter;
use crate::config::{optional_str, FilterConfig};
use crate::core::Message;
use async_trait::async_trait;

/// Splits `payload[field]` by a literal delimiter, writing parts into keys
/// `prefix0, prefix1, …`. Missing field is forwarded unchanged.
pub struct SplitFilter {
    field: String,
    delimiter: String,
    prefix: String,
}

impl SplitFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        let delimiter = optional_str(&cfg.options, "delimiter")
            .ok_or_else(|| anyhow::anyhow!("split filter '{}': missing required option 'delimiter'", cfg.name))?;
        let prefix = optional_str(&cfg.options, "prefix").unwrap_or_else(|| "part".to_string());
        Ok(Self { field: cfg.field.clone(), delimiter, prefix })
    }
}

#[async_trait]
impl Filter for SplitFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        let Some(value) = msg.payload.get(&self.field).cloned() else {
            return Ok(Some(msg));
        };
        for (i, part) in value.split(self.delimiter.as_str()).enumerate() {
            msg.payload.insert(format!("{}{}", self.prefix, i), part.to_string());
        }
        Ok(Some(msg))
    }
}
