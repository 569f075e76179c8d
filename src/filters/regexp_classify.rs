use super::{value_to_string, Filter, FilterCounters};
use crate::config::FilterConfig;
use crate::core::Message;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(60);
const HOUSEKEEP_PAUSE: Duration = Duration::from_secs(10);

struct Rule {
    name: String,
    pattern: Regex,
    overlay: HashMap<String, String>,
}

struct CacheEntry {
    overlay: HashMap<String, String>,
    last_activation: Instant,
    counter: u64,
}

/// Runs all classification rules against `payload[field]` in lexical rule-name
/// order and memoizes the union of matching overlays keyed by the observed
/// field value, so repeat values apply in O(1) instead of re-matching every
/// rule. Entries older than 60 seconds are evicted every `service_interval`
/// messages; the housekeeping pass itself then pauses 10 seconds, matching
/// the pacing of the original cache sweep.
pub struct RegexpClassifyFilter {
    field: String,
    rules: Vec<Rule>,
    cache: HashMap<String, CacheEntry>,
    counters: Option<Arc<FilterCounters>>,
}

impl RegexpClassifyFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        if cfg.options.is_empty() {
            anyhow::bail!("regexp_classify filter '{}': requires at least one classification rule", cfg.name);
        }
        let mut names: Vec<&String> = cfg.options.keys().collect();
        names.sort();

        let mut rules = Vec::with_capacity(names.len());
        for name in names {
            let rule_value = cfg.options.get(name).unwrap();
            let obj = rule_value.as_object().ok_or_else(|| {
                anyhow::anyhow!("regexp_classify filter '{}': rule '{}' must be an object with a 'pattern' and overlay fields", cfg.name, name)
            })?;
            let pattern_str = obj
                .get("pattern")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("regexp_classify filter '{}': rule '{}' missing 'pattern'", cfg.name, name))?;
            let pattern = Regex::new(pattern_str)
                .map_err(|e| anyhow::anyhow!("regexp_classify filter '{}': rule '{}' invalid pattern: {}", cfg.name, name, e))?;
            let overlay = obj
                .iter()
                .filter(|(k, _)| k.as_str() != "pattern")
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect();
            rules.push(Rule { name: name.clone(), pattern, overlay });
        }

        Ok(Self { field: cfg.field.clone(), rules, cache: HashMap::new(), counters: None })
    }
}

#[async_trait]
impl Filter for RegexpClassifyFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        let Some(value) = msg.payload.get(&self.field).cloned() else {
            return Ok(Some(msg));
        };

        if let Some(entry) = self.cache.get_mut(&value) {
            entry.last_activation = Instant::now();
            entry.counter += 1;
            for (k, v) in &entry.overlay {
                msg.payload.insert(k.clone(), v.clone());
            }
            return Ok(Some(msg));
        }

        let mut union = HashMap::new();
        for rule in &self.rules {
            if rule.pattern.is_match(&value) {
                if let Some(counters) = &self.counters {
                    counters.record_rule_match(&rule.name);
                }
                for (k, v) in &rule.overlay {
                    union.insert(k.clone(), v.clone());
                }
            }
        }

        for (k, v) in &union {
            msg.payload.insert(k.clone(), v.clone());
        }
        self.cache.insert(
            value,
            CacheEntry { overlay: union, last_activation: Instant::now(), counter: 1 },
        );

        Ok(Some(msg))
    }

    async fn housekeep(&mut self) {
        let now = Instant::now();
        self.cache.retain(|_, entry| now.duration_since(entry.last_activation) < CACHE_TTL);
        tokio::time::sleep(HOUSEKEEP_PAUSE).await;
    }

    fn attach_counters(&mut self, counters: Arc<FilterCounters>) {
        self.counters = Some(counters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> RegexpClassifyFilter {
        let options = [(
            "rule1".to_string(),
            serde_json::json!({"pattern": "abc", "kind": "test"}),
        )]
        .into_iter()
        .collect();
        RegexpClassifyFilter::new(&FilterConfig {
            name: "classify1".into(),
            plugin: "regexp_classify".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 100,
            debug: false,
            options,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn cache_is_warm_after_first_occurrence_and_deterministic() {
        let mut f = filter();
        let cold = f.process(Message::new("h", "abc")).await.unwrap().unwrap();
        assert_eq!(f.cache.len(), 1);
        let warm = f.process(Message::new("h", "abc")).await.unwrap().unwrap();
        assert_eq!(cold.payload.get("kind"), warm.payload.get("kind"));
        assert_eq!(f.cache.get("abc").unwrap().counter, 2);
    }

    #[tokio::test]
    async fn stale_entries_are_evicted_by_housekeeping() {
        let mut f = filter();
        f.process(Message::new("h", "abc")).await.unwrap();
        if let Some(entry) = f.cache.get_mut("abc") {
            entry.last_activation = Instant::now() - Duration::from_secs(70);
        }
        let now = Instant::now();
        f.cache.retain(|_, e| now.duration_since(e.last_activation) < CACHE_TTL);
        assert!(f.cache.is_empty());
    }
}
