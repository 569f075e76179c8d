use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The unit of flow through the pipeline.
///
/// Values, not shared references: a filter that mutates `payload` clones the
/// message (or takes ownership of it) and forwards the result. No message is
/// ever observed by two stages concurrently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub accept_time: DateTime<Utc>,
    pub hostname: String,
    pub content: String,
    pub tags: Vec<String>,
    pub payload: HashMap<String, String>,
}

impl Message {
    /// Builds a message the way an input adapter does: `content` and
    /// `hostname` are always mirrored into the payload.
    pub fn new(hostname: impl Into<String>, content: impl Into<String>) -> Self {
        let hostname = hostname.into();
        let content = content.into();

        let mut payload = HashMap::new();
        payload.insert("content".to_string(), content.clone());
        payload.insert("hostname".to_string(), hostname.clone());

        Self {
            accept_time: Utc::now(),
            hostname,
            content,
            tags: Vec::new(),
            payload,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.payload.get(name).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_mirrors_content_and_hostname_into_payload() {
        let msg = Message::new("host-a", "hello world");
        assert_eq!(msg.field("content"), Some("hello world"));
        assert_eq!(msg.field("hostname"), Some("host-a"));
        assert!(msg.tags.is_empty());
    }
}
