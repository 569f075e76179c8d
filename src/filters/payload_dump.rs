use super::Filter;
use crate::config::FilterConfig;
use crate::core::Message;
use async_trait::async_trait;

/// Emits a human-formatted dump of the payload to the log and forwards the
/// message unchanged. A debug aid, not a transform.
pub struct PayloadDumpFilter {
    name: String,
}

impl PayloadDumpFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        Ok(Self { name: cfg.name.clone() })
    }
}

#[async_trait]
impl Filter for PayloadDumpFilter {
    async fn process(&mut self, msg: Message) -> anyhow::Result<Option<Message>> {
        let mut keys: Vec<&String> = msg.payload.keys().collect();
        keys.sort();
        let dump = keys
            .into_iter()
            .map(|k| format!("{}={}", k, msg.payload[k]))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(filter = %self.name, "{}", dump);
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_the_message_unchanged() {
        let mut f = PayloadDumpFilter::new(&FilterConfig {
            name: "dump1".into(),
            plugin: "payload_dump".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: true,
            options: Default::default(),
        })
        .unwrap();

        let msg = Message::new("h", "hello");
        let out = f.process(msg.clone()).await.unwrap().unwrap();
        assert_eq!(out.payload, msg.payload);
    }
}
