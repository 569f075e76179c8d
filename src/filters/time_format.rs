use super::Filter;
use crate::config::{optional_str, require_str, FilterConfig};
use crate::core::Message;
use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parses `payload[field]` using a configured source format, optionally
/// shifts timezone, then writes the reformatted value to `target_field`
/// (defaults to `field`). On parse error, if `on_error = "current_time"`,
/// substitutes the current instant instead of failing the message.
pub struct TimeFormatFilter {
    field: String,
    source_format: String,
    target_format: String,
    target_field: String,
    timezone: Option<Tz>,
    use_current_time_on_error: bool,
}

impl TimeFormatFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        let source_format = require_str(&cfg.options, "time_format", &cfg.name, "source_format")?.to_string();
        let target_format = require_str(&cfg.options, "time_format", &cfg.name, "target_format")?.to_string();
        let target_field = optional_str(&cfg.options, "target_field").unwrap_or_else(|| cfg.field.clone());
        let timezone = optional_str(&cfg.options, "timezone")
            .map(|tz| {
                tz.parse::<Tz>()
                    .map_err(|_| anyhow::anyhow!("time_format filter '{}': unknown timezone '{}'", cfg.name, tz))
            })
            .transpose()?;
        let use_current_time_on_error = optional_str(&cfg.options, "on_error").as_deref() == Some("current_time");

        Ok(Self {
            field: cfg.field.clone(),
            source_format,
            target_format,
            target_field,
            timezone,
            use_current_time_on_error,
        })
    }

    fn render(&self, naive: NaiveDateTime) -> String {
        match self.timezone {
            Some(tz) => Utc.from_utc_datetime(&naive).with_timezone(&tz).format(&self.target_format).to_string(),
            None => naive.format(&self.target_format).to_string(),
        }
    }
}

#[async_trait]
impl Filter for TimeFormatFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        let Some(value) = msg.payload.get(&self.field).cloned() else {
            return Ok(Some(msg));
        };

        match NaiveDateTime::parse_from_str(&value, &self.source_format) {
            Ok(naive) => {
                msg.payload.insert(self.target_field.clone(), self.render(naive));
            }
            Err(_) if self.use_current_time_on_error => {
                msg.payload.insert(self.target_field.clone(), self.render(Utc::now().naive_utc()));
            }
            Err(_) => {
                tracing::debug!(field = %self.field, value = %value, "time_format: unparsable value, passing through");
            }
        }

        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(on_error: Option<&str>) -> TimeFormatFilter {
        let mut options: std::collections::HashMap<String, serde_json::Value> = [
            ("source_format".to_string(), serde_json::json!("%Y-%m-%d %H:%M:%S")),
            ("target_format".to_string(), serde_json::json!("%Y/%m/%d")),
        ]
        .into_iter()
        .collect();
        if let Some(oe) = on_error {
            options.insert("on_error".to_string(), serde_json::json!(oe));
        }
        TimeFormatFilter::new(&FilterConfig {
            name: "tf1".into(),
            plugin: "time_format".into(),
            field: "ts".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: false,
            options,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn reformats_a_parseable_timestamp() {
        let mut f = filter(None);
        let mut msg = Message::new("h", "c");
        msg.payload.insert("ts".into(), "2024-03-05 10:20:30".into());
        let out = f.process(msg).await.unwrap().unwrap();
        assert_eq!(out.payload.get("ts").unwrap(), "2024/03/05");
    }

    #[tokio::test]
    async fn unparseable_value_passes_through_without_on_error() {
        let mut f = filter(None);
        let mut msg = Message::new("h", "c");
        msg.payload.insert("ts".into(), "not a timestamp".into());
        let out = f.process(msg).await.unwrap().unwrap();
        assert_eq!(out.payload.get("ts").unwrap(), "not a timestamp");
    }

    #[tokio::test]
    async fn unparseable_value_substitutes_current_time_when_configured() {
        let mut f = filter(Some("current_time"));
        let mut msg = Message::new("h", "c");
        msg.payload.insert("ts".into(), "garbage".into());
        let out = f.process(msg).await.unwrap().unwrap();
        assert_ne!(out.payload.get("ts").unwrap(), "garbage");
    }
}
