use super::Filter;
use crate::config::{optional_str, require_str, FilterConfig};
use crate::core::Message;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const CACHE_TTL: Duration = Duration::from_secs(3600);

enum OnFail {
    Retry,
    Skip,
}

struct CacheEntry {
    overlay: HashMap<String, String>,
    inserted_at: Instant,
}

/// Enrichment call against an HTTP endpoint, memoized by a deterministic
/// cache key over a fixed set of configured fields. Reader-writer discipline:
/// lookups take the shared read lock, inserts and evictions take the
/// exclusive write lock — multiple workers of this filter may share one
/// cache safely, unlike the classify filter's single-owner cache.
pub struct WebRpcFilter {
    url: String,
    fields: Vec<String>,
    on_fail: OnFail,
    client: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl WebRpcFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        let url = require_str(&cfg.options, "web_rpc", &cfg.name, "url")?.to_string();
        let mut fields: Vec<String> = cfg
            .options
            .get("fields")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .ok_or_else(|| anyhow::anyhow!("web_rpc filter '{}': missing required array option 'fields'", cfg.name))?;
        fields.sort();

        let on_fail = match optional_str(&cfg.options, "on_fail").as_deref() {
            Some("skip") => OnFail::Skip,
            Some("retry") | None => OnFail::Retry,
            Some(other) => anyhow::bail!("web_rpc filter '{}': invalid on_fail '{}'", cfg.name, other),
        };

        Ok(Self {
            url,
            fields,
            on_fail,
            client: reqwest::Client::new(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn canonical_params(&self, msg: &Message) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|f| (f.clone(), msg.payload.get(f).cloned().unwrap_or_else(|| "-".to_string())))
            .collect()
    }

    fn cache_key(params: &BTreeMap<String, String>) -> String {
        let canonical = serde_json::to_string(params).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        BASE64.encode(digest)
    }

    async fn fetch(&self, params: &BTreeMap<String, String>) -> anyhow::Result<HashMap<String, String>> {
        let response = self.client.post(&self.url).form(params).send().await?.error_for_status()?;
        let overlay = response.json::<HashMap<String, String>>().await?;
        Ok(overlay)
    }
}

#[async_trait]
impl Filter for WebRpcFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        let params = self.canonical_params(&msg);
        let key = Self::cache_key(&params);

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.inserted_at.elapsed() < CACHE_TTL {
                    for (k, v) in &entry.overlay {
                        msg.payload.insert(k.clone(), v.clone());
                    }
                    return Ok(Some(msg));
                }
            }
        }

        let mut attempt: u64 = 0;
        loop {
            match self.fetch(&params).await {
                Ok(overlay) => {
                    for (k, v) in &overlay {
                        msg.payload.insert(k.clone(), v.clone());
                    }
                    self.cache.write().await.insert(key, CacheEntry { overlay, inserted_at: Instant::now() });
                    return Ok(Some(msg));
                }
                Err(err) => match self.on_fail {
                    OnFail::Skip => {
                        tracing::warn!(error = %err, "web_rpc: enrichment call failed, forwarding un-enriched");
                        return Ok(Some(msg));
                    }
                    OnFail::Retry => {
                        attempt += 1;
                        tracing::warn!(error = %err, attempt, "web_rpc: enrichment call failed, retrying");
                        tokio::time::sleep(Duration::from_secs(attempt)).await;
                    }
                },
            }
        }
    }

    async fn housekeep(&mut self) {
        let now = Instant::now();
        self.cache.write().await.retain(|_, entry| now.duration_since(entry.inserted_at) < CACHE_TTL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_regardless_of_field_presence() {
        let fields = vec!["a".to_string(), "b".to_string()];
        let filter = WebRpcFilter {
            url: "http://example".into(),
            fields,
            on_fail: OnFail::Skip,
            client: reqwest::Client::new(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        };

        let mut msg1 = Message::new("h", "c");
        msg1.payload.insert("a".into(), "1".into());
        // "b" is absent from msg1 -> canonicalizes to "-"

        let mut msg2 = Message::new("h", "c");
        msg2.payload.insert("a".into(), "1".into());
        msg2.payload.insert("b".into(), "-".into());

        let key1 = WebRpcFilter::cache_key(&filter.canonical_params(&msg1));
        let key2 = WebRpcFilter::cache_key(&filter.canonical_params(&msg2));
        assert_eq!(key1, key2);
    }
}
