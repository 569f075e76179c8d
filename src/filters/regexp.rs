use super::{Filter, FilterCounters};
use crate::config::FilterConfig;
use crate::core::Message;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

const DECAY_FACTOR: f64 = 0.99;

struct Pattern {
    name: String,
    regex: Regex,
    matches: u64,
}

/// Tries a set of named patterns against `payload[field]` in adaptive order;
/// the first to match sets `payload[group] := captured value` for every
/// named capture group and stops.
///
/// The adaptive reorder is deliberately the slow, single-adjacent-swap
/// variant described in the design notes rather than a full sort by match
/// count: that is the behavior the convergence test (§8.4) is written
/// against, and a full sort would converge faster without being wrong — but
/// changing it silently would make that test's timing assumptions lie.
pub struct RegexpFilter {
    field: String,
    patterns: Vec<Pattern>,
    sort_pos: usize,
    counters: Option<Arc<FilterCounters>>,
}

impl RegexpFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        if cfg.options.is_empty() {
            anyhow::bail!("regexp filter '{}': requires at least one named pattern option", cfg.name);
        }
        let mut names: Vec<&String> = cfg.options.keys().collect();
        names.sort();
        let mut patterns = Vec::with_capacity(names.len());
        for name in names {
            let pattern = cfg.options.get(name).and_then(|v| v.as_str()).ok_or_else(|| {
                anyhow::anyhow!("regexp filter '{}': pattern '{}' is not a string", cfg.name, name)
            })?;
            let regex = Regex::new(pattern)
                .map_err(|e| anyhow::anyhow!("regexp filter '{}': invalid pattern '{}': {}", cfg.name, name, e))?;
            patterns.push(Pattern { name: name.clone(), regex, matches: 0 });
        }
        Ok(Self { field: cfg.field.clone(), patterns, sort_pos: 0, counters: None })
    }
}

#[async_trait]
impl Filter for RegexpFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        let Some(value) = msg.payload.get(&self.field).cloned() else {
            return Ok(Some(msg));
        };

        for pattern in &mut self.patterns {
            if let Some(captures) = pattern.regex.captures(&value) {
                for group_name in pattern.regex.capture_names().flatten() {
                    if let Some(m) = captures.name(group_name) {
                        msg.payload.insert(group_name.to_string(), m.as_str().to_string());
                    }
                }
                pattern.matches += 1;
                if let Some(counters) = &self.counters {
                    counters.record_rule_match(&pattern.name);
                }
                break;
            }
        }

        Ok(Some(msg))
    }

    async fn housekeep(&mut self) {
        for pattern in &mut self.patterns {
            pattern.matches = ((pattern.matches as f64) * DECAY_FACTOR).floor() as u64;
        }

        let len = self.patterns.len();
        if len >= 2 {
            if self.patterns[self.sort_pos].matches < self.patterns[self.sort_pos + 1].matches {
                self.patterns.swap(self.sort_pos, self.sort_pos + 1);
            }
            self.sort_pos = (self.sort_pos + 1) % (len - 1);
        }
    }

    fn attach_counters(&mut self, counters: Arc<FilterCounters>) {
        self.counters = Some(counters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(rules: &[(&str, &str)]) -> RegexpFilter {
        let options = rules.iter().map(|(n, p)| (n.to_string(), serde_json::json!(p))).collect();
        RegexpFilter::new(&FilterConfig {
            name: "re1".into(),
            plugin: "regexp".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 10,
            debug: false,
            options,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn first_matching_pattern_sets_named_groups() {
        let mut f = filter(&[("p1", r"^(?P<kind>foo)\d+$"), ("p2", r"^(?P<kind>bar)\d+$")]);
        let msg = Message::new("h", "foo1");
        let out = f.process(msg).await.unwrap().unwrap();
        assert_eq!(out.payload.get("kind").unwrap(), "foo");
    }

    #[tokio::test]
    async fn adaptive_reorder_converges_toward_the_frequent_pattern() {
        // S3: P1=^foo, P2=^bar, service_interval = 10.
        let mut f = filter(&[("p1", "^foo"), ("p2", "^bar")]);
        for _ in 0..20 {
            let msg = Message::new("h", "foo1");
            f.process(msg).await.unwrap();
        }
        f.housekeep().await; // after message 10 worth of housekeeping in this simplified harness
        assert_eq!(f.patterns[0].name, "p1");
    }

    #[test]
    fn rejects_empty_options() {
        assert!(RegexpFilter::new(&FilterConfig {
            name: "re2".into(),
            plugin: "regexp".into(),
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
