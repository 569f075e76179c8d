use super::Filter;
use crate::config::FilterConfig;
use crate::core::Message;
use async_trait::async_trait;

enum Status {
    Required,
    Absent,
}

/// A message passes iff every `required` field is present and every `absent`
/// field is missing; otherwise it is dropped.
pub struct PayloadAssertFilter {
    rules: Vec<(String, Status)>,
}

impl PayloadAssertFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        if cfg.options.is_empty() {
            anyhow::bail!("payload_assert filter '{}': requires at least one field=status option", cfg.name);
        }
        let mut rules = Vec::with_capacity(cfg.options.len());
        for (field, value) in &cfg.options {
            let status = match value.as_str() {
                Some("required") => Status::Required,
                Some("absent") => Status::Absent,
                other => anyhow::bail!(
                    "payload_assert filter '{}': field '{}' has invalid status {:?}, expected 'required' or 'absent'",
                    cfg.name,
                    field,
                    other
                ),
            };
            rules.push((field.clone(), status));
        }
        Ok(Self { rules })
    }
}

#[async_trait]
impl Filter for PayloadAssertFilter {
    async fn process(&mut self, msg: Message) -> anyhow::Result<Option<Message>> {
        for (field, status) in &self.rules {
            let present = msg.payload.contains_key(field);
            match status {
                Status::Required if !present => return Ok(None),
                Status::Absent if present => return Ok(None),
                _ => {}
            }
        }
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(rules: &[(&str, &str)]) -> PayloadAssertFilter {
        let options = rules.iter().map(|(f, s)| (f.to_string(), serde_json::json!(s))).collect();
        PayloadAssertFilter::new(&FilterConfig {
            name: "assert1".into(),
            plugin: "payload_assert".into(),
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
    async fn s2_rename_then_assert() {
        let mut f = filter(&[("new", "required")]);
        let mut msg = Message::new("h", "c");
        msg.payload.insert("new".into(), "x".into());
        assert!(f.process(msg).await.unwrap().is_some());

        let msg = Message::new("h", "c");
        assert!(f.process(msg).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn absent_status_drops_when_field_is_present() {
        let mut f = filter(&[("forbidden", "absent")]);
        let mut msg = Message::new("h", "c");
        msg.payload.insert("forbidden".into(), "x".into());
        assert!(f.process(msg).await.unwrap().is_none());
    }
}
