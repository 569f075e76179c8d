//! Translates a parsed configuration into the running graph and supervises
//! it: construction allocates queues and instantiates every plugin, failing
//! fast on any construction error; start launches every worker and the
//! benchmark and status-snapshot loops.

use crate::config::Config;
use crate::core::benchmark::BenchmarkRegistry;
use crate::core::status::{BenchmarkView, PipelineStatus, QueueView, StatusSnapshot};
use crate::core::Queue;
use crate::filters::{self, FilterCounters};
use crate::inputs::{self, Input};
use crate::outputs::{self, Output};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

struct FilterStage {
    name: String,
    config: crate::config::FilterConfig,
    instances: Vec<Box<dyn filters::Filter>>,
    queue: Queue,
    counters: Arc<FilterCounters>,
}

/// Owns the queues, instantiated plugins, and shared state (benchmark
/// registry, status snapshot) for one running pipeline.
pub struct Orchestrator {
    config: Config,
    in_queue: Queue,
    out_queue: Queue,
    inputs: Vec<(crate::config::InputConfig, Box<dyn Input>)>,
    filters: Vec<FilterStage>,
    outputs: Vec<(crate::config::OutputConfig, Box<dyn Output>)>,
    benchmark: Arc<BenchmarkRegistry>,
    status: Arc<RwLock<StatusSnapshot>>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    filter_counters: Vec<Arc<FilterCounters>>,
}

impl Orchestrator {
    /// Construction contract (§4.1): validate, instantiate every plugin,
    /// allocate every queue. Any failure here aborts startup before a
    /// single worker is launched.
    pub fn build(config: Config) -> anyhow::Result<Self> {
        crate::config::validate(&config)?;

        let in_queue = Queue::bounded(config.in_queue);
        let out_queue = Queue::bounded(config.out_queue);

        let mut built_inputs = Vec::with_capacity(config.inputs.len());
        for input_cfg in &config.inputs {
            let input = inputs::build_input(input_cfg)?;
            tracing::info!(
                input = %input_cfg.name,
                plugin = %input_cfg.plugin,
                threads = input_cfg.threads,
                "input configured"
            );
            built_inputs.push((input_cfg.clone(), input));
        }

        let mut built_filters = Vec::with_capacity(config.filters.len());
        for filter_cfg in &config.filters {
            tracing::info!(
                filter = %filter_cfg.name,
                plugin = %filter_cfg.plugin,
                field = %filter_cfg.field,
                service_interval = filter_cfg.service_interval,
                threads = filter_cfg.threads,
                "filter configured"
            );

            let mut instances = Vec::with_capacity(filter_cfg.threads.max(1));
            for _ in 0..filter_cfg.threads.max(1) {
                instances.push(filters::build_filter(filter_cfg)?);
            }

            built_filters.push(FilterStage {
                name: filter_cfg.name.clone(),
                config: filter_cfg.clone(),
                instances,
                queue: Queue::bounded(filter_cfg.queue),
                counters: Arc::new(FilterCounters::new(filter_cfg.name.clone(), filter_cfg.plugin.clone())),
            });
        }

        let mut built_outputs = Vec::with_capacity(config.outputs.len());
        for output_cfg in &config.outputs {
            let output = outputs::build_output(output_cfg)?;
            tracing::info!(
                output = %output_cfg.name,
                plugin = %output_cfg.plugin,
                threads = output_cfg.threads,
                "output configured"
            );
            built_outputs.push((output_cfg.clone(), output));
        }

        let input_names = built_inputs.iter().map(|(cfg, _)| cfg.name.clone()).collect();
        let output_names = built_outputs.iter().map(|(cfg, _)| cfg.name.clone()).collect();
        let filter_counters = built_filters.iter().map(|s| s.counters.clone()).collect();

        Ok(Self {
            config,
            in_queue,
            out_queue,
            inputs: built_inputs,
            filters: built_filters,
            outputs: built_outputs,
            benchmark: BenchmarkRegistry::new(),
            status: Arc::new(RwLock::new(StatusSnapshot::default())),
            input_names,
            output_names,
            filter_counters,
        })
    }

    pub fn status(&self) -> Arc<RwLock<StatusSnapshot>> {
        self.status.clone()
    }

    pub fn benchmark(&self) -> Arc<BenchmarkRegistry> {
        self.benchmark.clone()
    }

    /// Per-input tap names, for `ll_input_generated{input}` metrics.
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Per-filter instrumentation, for `ll_filters_input`/`_output`/
    /// `_regexp_matches`/`_regexp_classify_matches` metrics.
    pub fn filter_counters(&self) -> &[Arc<FilterCounters>] {
        &self.filter_counters
    }

    /// Start contract (§4.1): launch input workers, wire the filter chain
    /// (input queue -> sub-queue[0] -> ... -> output queue, or alias output
    /// queue to input queue with no filters configured), stagger-launch
    /// output workers, start the benchmark dispatcher, and begin publishing
    /// status snapshots every `stat_interval` seconds.
    pub async fn run(mut self, cancel: CancellationToken) {
        for (input_cfg, input) in self.inputs.drain(..) {
            let tap = self.benchmark.register(&input_cfg.name).expect("register before dispatcher starts");
            let replicas = if input.is_multi_thread() { input_cfg.threads.max(1) } else { 1 };
            let mut first = Some(input);
            for _ in 0..replicas {
                let worker = match first.take() {
                    Some(w) => w,
                    None => inputs::build_input(&input_cfg).expect("input already validated at construction"),
                };
                let mut worker = worker;
                let cancel = cancel.clone();
                let queue = self.in_queue.sender();
                let tap = tap.clone();
                let name = input_cfg.name.clone();
                tokio::spawn(async move {
                    worker.run(cancel, queue, tap).await;
                    tracing::info!(input = %name, "input worker exited");
                });
            }
        }

        let stage_count = self.filters.len();
        if stage_count == 0 {
            self.out_queue = self.in_queue.clone();
        }

        let filters_for_status: Vec<(String, Queue)> =
            self.filters.iter().map(|stage| (stage.name.clone(), stage.queue.clone())).collect();

        let mut upstream = self.in_queue.receiver();
        for (i, stage) in self.filters.drain(..).enumerate() {
            let downstream = if i + 1 == stage_count { self.out_queue.sender() } else { stage.queue.sender() };
            let stage_input = upstream.clone();

            for mut instance in stage.instances {
                instance.attach_counters(stage.counters.clone());
                let cancel = cancel.clone();
                let input = stage_input.clone();
                let output = downstream.clone();
                let cfg = stage.config.clone();
                let counters = stage.counters.clone();
                tokio::spawn(async move {
                    filters::run_filter(instance, cfg, cancel, input, output, counters).await;
                });
            }

            upstream = stage.queue.receiver();
        }

        let splay = std::time::Duration::from_secs(self.config.global.output_splay);
        let mut first_output = true;
        for (output_cfg, mut output) in self.outputs.drain(..) {
            let tap = self.benchmark.register(&output_cfg.name).expect("register before dispatcher starts");
            for thread in 0..output_cfg.threads.max(1) {
                if first_output {
                    first_output = false;
                } else {
                    tokio::time::sleep(splay).await;
                }

                let cancel = cancel.clone();
                let input = self.out_queue.receiver();
                let tap = tap.clone();
                let mut runtime_options = HashMap::new();
                runtime_options.insert("THREAD".to_string(), thread.to_string());
                let name = output_cfg.name.clone();

                tokio::spawn(async move {
                    output.run(cancel, input, runtime_options, tap).await;
                    tracing::info!(output = %name, "output worker exited");
                });
            }
        }

        let benchmark = self.benchmark.clone();
        tokio::spawn(benchmark.run(cancel.clone()));

        let stat_interval = std::time::Duration::from_secs(self.config.global.stat_interval.max(1));
        let in_queue = self.in_queue.clone();
        let out_queue = self.out_queue.clone();
        let status = self.status.clone();
        let registry = self.benchmark.clone();
        let input_names = self.input_names.clone();
        let output_names = self.output_names.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(stat_interval) => {}
            }

            let input_benchmark = input_names.first().and_then(|n| registry.get(n)).map(BenchmarkView::from);
            let output_benchmark = output_names.first().and_then(|n| registry.get(n)).map(BenchmarkView::from);

            let snapshot = PipelineStatus {
                input: QueueView { name: "in".to_string(), size: in_queue.len(), benchmark: input_benchmark },
                filters: filters_for_status
                    .iter()
                    .map(|(name, queue)| QueueView { name: name.clone(), size: queue.len(), benchmark: None })
                    .collect(),
                output: QueueView { name: "out".to_string(), size: out_queue.len(), benchmark: output_benchmark },
            };

            *status.write().unwrap() = StatusSnapshot { pipelines: vec![snapshot] };
        }
    }
}
