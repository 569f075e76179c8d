use super::Output;
use crate::config::{optional_u64, OutputConfig};
use crate::core::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const DEFAULT_PERIOD_SECS: u64 = 10;

/// Drains its input queue and logs a rolling RPS figure every `period`
/// seconds (default 10). Makes no external writes; exists purely to report
/// throughput when a pipeline has no other sink worth measuring against.
pub struct StatOutput {
    period: Duration,
}

impl StatOutput {
    pub fn new(cfg: &OutputConfig) -> anyhow::Result<Self> {
        let period = Duration::from_secs(optional_u64(&cfg.options, "period").unwrap_or(DEFAULT_PERIOD_SECS));
        Ok(Self { period })
    }
}

#[async_trait]
impl Output for StatOutput {
    async fn run(
        &mut self,
        cancel: tokio_util::sync::CancellationToken,
        input: flume::Receiver<Message>,
        _runtime_options: HashMap<String, String>,
        counter: flume::Sender<u64>,
    ) {
        let mut window_count: u64 = 0;
        let mut window_start = Instant::now();

        loop {
            let recv = tokio::select! {
                _ = cancel.cancelled() => break,
                recv = input.recv_async() => recv,
            };

            match recv {
                Ok(_msg) => {
                    window_count += 1;
                    let _ = counter.send_async(1).await;
                }
                Err(_) => break,
            }

            let elapsed = window_start.elapsed();
            if elapsed >= self.period {
                let rps = window_count as f64 / elapsed.as_secs_f64();
                tracing::info!(rps = rps, "stat output: throughput over last {:?}", elapsed);
                window_count = 0;
                window_start = Instant::now();
            }
        }
    }
}
