//! HCL configuration loading.
//!
//! The file is parsed once at startup into the generic [`hcl::Body`] AST and
//! walked by hand rather than deserialized straight into application structs:
//! the `filter { … }` blocks repeat with the same identifier and their order
//! *is* the pipeline's filter-chain order, which a label-keyed map (the usual
//! serde shortcut for repeated HCL blocks) would silently discard.

use super::types::{Config, FilterConfig, GlobalConfig, InputConfig, OutputConfig, Options};
use super::types::{DEFAULT_FIELD, DEFAULT_FILTER_SERVICE_INTERVAL, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKER_THREADS};
use anyhow::{anyhow, Context, Result};
use hcl::{Block, Body, Expression, Structure};
use std::collections::HashMap;
use std::path::Path;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;
    load_config_from_str(&content).with_context(|| format!("parsing configuration file {}", path.display()))
}

pub fn load_config_from_str(content: &str) -> Result<Config> {
    let body: Body = hcl::parse(content).context("invalid HCL syntax")?;

    let global = body_blocks(&body, "global")
        .first()
        .map(|b| parse_global(b.body()))
        .transpose()?
        .unwrap_or_default();

    let in_block = body_blocks(&body, "in").first().copied();
    let in_queue = in_block
        .and_then(|b| attr_u64(b.body(), "queue"))
        .map(|v| v as usize)
        .unwrap_or(DEFAULT_QUEUE_CAPACITY);
    let inputs = in_block
        .map(|b| parse_inputs(b.body()))
        .transpose()?
        .unwrap_or_default();

    let out_block = body_blocks(&body, "out").first().copied();
    let out_queue = out_block
        .and_then(|b| attr_u64(b.body(), "queue"))
        .map(|v| v as usize)
        .unwrap_or(DEFAULT_QUEUE_CAPACITY);
    let outputs = out_block
        .map(|b| parse_outputs(b.body()))
        .transpose()?
        .unwrap_or_default();

    let filters = body_blocks(&body, "filter")
        .into_iter()
        .enumerate()
        .map(|(i, block)| parse_filter(i, block))
        .collect::<Result<Vec<_>>>()?;

    Ok(Config { global, in_queue, inputs, filters, out_queue, outputs })
}

fn parse_global(body: &Body) -> Result<GlobalConfig> {
    let mut cfg = GlobalConfig::default();
    if let Some(v) = attr_u64(body, "output_splay") {
        cfg.output_splay = v;
    }
    if let Some(v) = attr_u64(body, "stat_interval") {
        cfg.stat_interval = v;
    }
    if let Some(v) = attr_u64(body, "http_port") {
        cfg.http_port = v as u16;
    }
    Ok(cfg)
}

fn parse_inputs(body: &Body) -> Result<Vec<InputConfig>> {
    body_blocks(body, "input")
        .into_iter()
        .map(|block| {
            let name = single_label(block)?;
            let plugin = attr_string(block.body(), "plugin")
                .ok_or_else(|| anyhow!("input '{name}': missing required 'plugin'"))?;
            let threads = attr_u64(block.body(), "threads").map(|v| v as usize).unwrap_or(DEFAULT_WORKER_THREADS);
            let options = options_block(block.body());
            Ok(InputConfig { name, plugin, threads, options })
        })
        .collect()
}

fn parse_outputs(body: &Body) -> Result<Vec<OutputConfig>> {
    body_blocks(body, "output")
        .into_iter()
        .map(|block| {
            let name = single_label(block)?;
            let plugin = attr_string(block.body(), "plugin")
                .ok_or_else(|| anyhow!("output '{name}': missing required 'plugin'"))?;
            let threads = attr_u64(block.body(), "threads").map(|v| v as usize).unwrap_or(DEFAULT_WORKER_THREADS);
            let debug = attr_bool(block.body(), "debug").unwrap_or(false);
            let options = options_block(block.body());
            Ok(OutputConfig { name, plugin, threads, debug, options })
        })
        .collect()
}

fn parse_filter(i: usize, block: &Block) -> Result<FilterConfig> {
    let name = single_label(block).unwrap_or_else(|_| String::new());
    let body = block.body();
    let plugin = attr_string(body, "plugin")
        .ok_or_else(|| anyhow!("filter '{name}': missing required 'plugin'"))?;
    let field = attr_string(body, "field").filter(|f| !f.is_empty()).unwrap_or_else(|| DEFAULT_FIELD.to_string());
    let queue = attr_u64(body, "queue").map(|v| v as usize).unwrap_or(DEFAULT_QUEUE_CAPACITY);
    let threads = attr_u64(body, "threads").map(|v| v as usize).unwrap_or(DEFAULT_WORKER_THREADS);
    let service_interval = attr_u64(body, "service_interval").unwrap_or(DEFAULT_FILTER_SERVICE_INTERVAL);
    let debug = attr_bool(body, "debug").unwrap_or(false);
    let options = options_block(body);

    let name = if name.is_empty() { format!("Filter #{i}") } else { name };

    Ok(FilterConfig { name, plugin, field, queue, threads, service_interval, debug, options })
}

fn single_label(block: &Block) -> Result<String> {
    block
        .labels()
        .first()
        .map(|l| l.as_str().to_string())
        .ok_or_else(|| anyhow!("block '{}' requires a name label", block.identifier()))
}

fn options_block(body: &Body) -> Options {
    body_blocks(body, "options")
        .first()
        .map(|b| {
            body_attributes(b.body())
                .into_iter()
                .map(|(k, v)| (k, expr_to_json(&v)))
                .collect()
        })
        .unwrap_or_default()
}

fn body_blocks<'a>(body: &'a Body, identifier: &str) -> Vec<&'a Block> {
    body.iter()
        .filter_map(|s| match s {
            Structure::Block(b) if b.identifier() == identifier => Some(b),
            _ => None,
        })
        .collect()
}

fn body_attributes(body: &Body) -> HashMap<String, Expression> {
    body.iter()
        .filter_map(|s| match s {
            Structure::Attribute(a) => Some((a.key().to_string(), a.expr().clone())),
            _ => None,
        })
        .collect()
}

fn attr_string(body: &Body, key: &str) -> Option<String> {
    body_attributes(body).get(key).map(expr_to_json).map(|v| match v {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn attr_u64(body: &Body, key: &str) -> Option<u64> {
    body_attributes(body).get(key).and_then(|e| match e {
        Expression::Number(n) => n.as_u64(),
        _ => None,
    })
}

fn attr_bool(body: &Body, key: &str) -> Option<bool> {
    body_attributes(body).get(key).and_then(|e| match e {
        Expression::Bool(b) => Some(*b),
        _ => None,
    })
}

fn expr_to_json(expr: &Expression) -> serde_json::Value {
    match expr {
        Expression::Null => serde_json::Value::Null,
        Expression::Bool(b) => serde_json::Value::Bool(*b),
        Expression::Number(n) => n
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Expression::String(s) => serde_json::Value::String(s.clone()),
        Expression::Array(items) => serde_json::Value::Array(items.iter().map(expr_to_json).collect()),
        Expression::Object(obj) => serde_json::Value::Object(
            obj.iter().map(|(k, v)| (k.to_string(), expr_to_json(v))).collect(),
        ),
        other => serde_json::Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        global { output_splay = 5  stat_interval = 30  http_port = 8080 }
        in { queue = 8192
             input "syslog_in" { plugin = "syslog"  threads = 1  options { ip = "0.0.0.0" port = 514 } } }
        filter "split1" { plugin = "split"  field = "content"  queue = 4096
                          threads = 1  service_interval = 100  debug = false
                          options { delimiter = " "  prefix = "w" } }
        out { queue = 8192
              output "console" { plugin = "stdout"  threads = 1  debug = false  options {} } }
    "#;

    #[test]
    fn parses_the_canonical_shape_in_order() {
        let cfg = load_config_from_str(SAMPLE).unwrap();
        assert_eq!(cfg.global.http_port, 8080);
        assert_eq!(cfg.in_queue, 8192);
        assert_eq!(cfg.inputs.len(), 1);
        assert_eq!(cfg.inputs[0].plugin, "syslog");
        assert_eq!(cfg.filters.len(), 1);
        assert_eq!(cfg.filters[0].name, "split1");
        assert_eq!(cfg.filters[0].queue, 4096);
        assert_eq!(cfg.outputs[0].plugin, "stdout");
    }

    #[test]
    fn defaults_apply_when_block_is_absent() {
        let cfg = load_config_from_str(r#"filter "f" { plugin = "set" options { a = "b" } }"#).unwrap();
        assert_eq!(cfg.filters[0].field, "content");
        assert_eq!(cfg.filters[0].queue, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(cfg.filters[0].service_interval, DEFAULT_FILTER_SERVICE_INTERVAL);
    }
}
