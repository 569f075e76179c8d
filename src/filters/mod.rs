mod copy;
mod geoip;
mod payload_assert;
mod payload_dump;
mod payload_equal;
mod regexp;
mod regexp_classify;
mod regexp_match;
mod regexp_remove;
mod rename;
mod set;
mod split;
mod substr_contains;
mod substring;
mod tcp_tee;
mod time_format;
mod web_rpc;

use crate::config::FilterConfig;
use crate::core::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// What every filter kind in §4.3 implements: read one message, optionally
/// transform it, and decide whether it continues downstream. Housekeeping
/// (cache eviction, adaptive reorder, metric flush) is driven by the shared
/// loop in [`run_filter`] counting messages against `service_interval`, not
/// by each filter managing its own timer.
#[async_trait]
pub trait Filter: Send {
    /// Transforms or drops one message. `Ok(None)` means drop.
    async fn process(&mut self, msg: Message) -> anyhow::Result<Option<Message>>;

    /// Called every `service_interval` messages; default no-op. Filters with
    /// housekeeping (regexp reorder, classify cache eviction, web_rpc cache
    /// eviction) override this.
    async fn housekeep(&mut self) {}

    /// Gives the filter a handle to its own counters, for filters that
    /// export more than the generic input/output pair (regexp, regexp_classify
    /// record per-rule match counts). Called once, before the worker loop
    /// starts.
    fn attach_counters(&mut self, _counters: std::sync::Arc<FilterCounters>) {}
}

/// Per-filter instrumentation: every read increments `input`, every forward
/// increments `output`. Regexp-family filters additionally record per-rule
/// match counts here, flattened into `/metrics` at scrape time.
pub struct FilterCounters {
    pub name: String,
    pub plugin: String,
    pub input: AtomicU64,
    pub output: AtomicU64,
    pub rule_matches: Mutex<HashMap<String, u64>>,
}

impl FilterCounters {
    pub fn new(name: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plugin: plugin.into(),
            input: AtomicU64::new(0),
            output: AtomicU64::new(0),
            rule_matches: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_rule_match(&self, rule: &str) {
        let mut matches = self.rule_matches.lock().unwrap();
        *matches.entry(rule.to_string()).or_insert(0) += 1;
    }
}

/// Stringifies an option value the way every payload field is stored:
/// `payload` is a map of string to string, so overlay/literal values coming
/// out of an untyped HCL options block are rendered to their plain text form.
pub(crate) fn value_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Constructs the filter implementation for a parsed `filter { … }` block.
/// Unknown plugin names are rejected by [`crate::config::validate`] before
/// construction is ever attempted here.
pub fn build_filter(cfg: &FilterConfig) -> anyhow::Result<Box<dyn Filter>> {
    let filter: Box<dyn Filter> = match cfg.plugin.as_str() {
        "set" => Box::new(set::SetFilter::new(cfg)?),
        "copy" => Box::new(copy::CopyFilter::new(cfg)?),
        "rename" => Box::new(rename::RenameFilter::new(cfg)?),
        "split" => Box::new(split::SplitFilter::new(cfg)?),
        "substring" => Box::new(substring::SubstringFilter::new(cfg)?),
        "regexp" => Box::new(regexp::RegexpFilter::new(cfg)?),
        "regexp_remove" => Box::new(regexp_remove::RegexpRemoveFilter::new(cfg)?),
        "regexp_match" => Box::new(regexp_match::RegexpMatchFilter::new(cfg)?),
        "substr_contains" => Box::new(substr_contains::SubstrContainsFilter::new(cfg)?),
        "regexp_classify" => Box::new(regexp_classify::RegexpClassifyFilter::new(cfg)?),
        "payload_assert" => Box::new(payload_assert::PayloadAssertFilter::new(cfg)?),
        "payload_equal" => Box::new(payload_equal::PayloadEqualFilter::new(cfg)?),
        "payload_dump" => Box::new(payload_dump::PayloadDumpFilter::new(cfg)?),
        "geoip" => Box::new(geoip::GeoipFilter::new(cfg)?),
        "time_format" => Box::new(time_format::TimeFormatFilter::new(cfg)?),
        "tcp_tee" => Box::new(tcp_tee::TcpTeeFilter::new(cfg)?),
        "web_rpc" => Box::new(web_rpc::WebRpcFilter::new(cfg)?),
        other => anyhow::bail!("unknown filter plugin '{other}'"),
    };
    Ok(filter)
}

/// The one worker loop every filter stage instance runs: read, count, apply
/// the filter, forward unless dropped, housekeep every `service_interval`
/// messages, exit on cancellation or upstream close.
pub async fn run_filter(
    mut filter: Box<dyn Filter>,
    cfg: FilterConfig,
    cancel: tokio_util::sync::CancellationToken,
    input: flume::Receiver<Message>,
    output: flume::Sender<Message>,
    counters: std::sync::Arc<FilterCounters>,
) {
    let service_interval = cfg.service_interval.max(1);
    let mut since_housekeep: u64 = 0;

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            recv = input.recv_async() => match recv {
                Ok(msg) => msg,
                Err(_) => break,
            },
        };

        counters.input.fetch_add(1, Ordering::Relaxed);

        match filter.process(msg).await {
            Ok(Some(out_msg)) => {
                if output.send_async(out_msg).await.is_err() {
                    break;
                }
                counters.output.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {
                tracing::debug!(filter = %cfg.name, "message dropped");
            }
            Err(err) => {
                tracing::error!(filter = %cfg.name, error = %err, "filter worker terminating on unrecoverable error");
                break;
            }
        }

        since_housekeep += 1;
        if since_housekeep >= service_interval {
            since_housekeep = 0;
            filter.housekeep().await;
        }
    }

    tracing::info!(filter = %cfg.name, "filter worker exiting");
}
