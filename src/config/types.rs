use serde_json::Value;
use std::collections::HashMap;

pub type Options = HashMap<String, Value>;

#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub output_splay: u64,
    pub stat_interval: u64,
    pub http_port: u16,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self { output_splay: 5, stat_interval: 30, http_port: 8080 }
    }
}

#[derive(Debug, Clone)]
pub struct InputConfig {
    pub name: String,
    pub plugin: String,
    pub threads: usize,
    pub options: Options,
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub name: String,
    pub plugin: String,
    pub field: String,
    pub queue: usize,
    pub threads: usize,
    pub service_interval: u64,
    pub debug: bool,
    pub options: Options,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub name: String,
    pub plugin: String,
    pub threads: usize,
    pub debug: bool,
    pub options: Options,
}

/// The fully parsed, defaulted configuration tree. Produced once at startup
/// by [`crate::config::loader::load_config`] and never mutated afterward.
#[derive(Debug, Clone)]
pub struct Config {
    pub global: GlobalConfig,
    pub in_queue: usize,
    pub inputs: Vec<InputConfig>,
    pub filters: Vec<FilterConfig>,
    pub out_queue: usize,
    pub outputs: Vec<OutputConfig>,
}

pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;
pub const DEFAULT_FILTER_SERVICE_INTERVAL: u64 = 65535;
pub const DEFAULT_WORKER_THREADS: usize = 1;
pub const DEFAULT_FIELD: &str = "content";
