//! Per-tap throughput accounting.
//!
//! A process-wide registry maps a tap name (`"input"`, `"output"`, a filter's
//! name, …) to a bounded integer channel and a [`BenchmarkCounter`]. Producers
//! (input workers, output workers after a flush) send batch-size deltas into
//! the channel; a single dispatcher loop drains every channel in round-robin
//! and folds deltas into `processed`, computing `rps` whenever `processed`
//! crosses the next 100,000-message threshold.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const RPS_WINDOW: u64 = 100_000;
const CHANNEL_CAPACITY: usize = 8192;
const IDLE_SWEEP_THRESHOLD: u64 = 1024;
const IDLE_SLEEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct BenchmarkCounter {
    pub processed: u64,
    pub rps: u64,
    pub last_rps_activation: Instant,
    pub last_rps_value: u64,
    pub next_rps_value: u64,
}

impl BenchmarkCounter {
    fn new() -> Self {
        Self {
            processed: 0,
            rps: 0,
            last_rps_activation: Instant::now(),
            last_rps_value: 0,
            next_rps_value: RPS_WINDOW,
        }
    }

    fn accumulate(&mut self, delta: u64, now: Instant) {
        self.processed += delta;
        if self.processed >= self.next_rps_value {
            let elapsed = now.duration_since(self.last_rps_activation).as_secs_f64();
            let value_delta = self.processed - self.last_rps_value;
            self.rps = if elapsed > 0.0 {
                (value_delta as f64 / elapsed).floor() as u64
            } else {
                0
            };
            self.last_rps_activation = now;
            self.last_rps_value = self.processed;
            self.next_rps_value = self.processed + RPS_WINDOW;
        }
    }
}

struct Tap {
    sender: flume::Sender<u64>,
    receiver: flume::Receiver<u64>,
}

/// Process-wide tap registry. `register` may only be called before
/// [`BenchmarkRegistry::run`] has started its dispatcher loop; new taps cannot
/// appear mid-run.
pub struct BenchmarkRegistry {
    taps: Mutex<HashMap<String, Tap>>,
    counters: Arc<Mutex<HashMap<String, BenchmarkCounter>>>,
    started: AtomicBool,
}

impl BenchmarkRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            taps: Mutex::new(HashMap::new()),
            counters: Arc::new(Mutex::new(HashMap::new())),
            started: AtomicBool::new(false),
        })
    }

    /// Registers a new named tap and returns the sender half producers use to
    /// report batch deltas. Fails if the dispatcher loop is already running.
    pub fn register(&self, name: impl Into<String>) -> anyhow::Result<flume::Sender<u64>> {
        if self.started.load(Ordering::SeqCst) {
            anyhow::bail!("cannot register a new benchmark tap after the dispatcher has started");
        }
        let name = name.into();
        let mut taps = self.taps.lock().unwrap();
        let (sender, receiver) = flume::bounded(CHANNEL_CAPACITY);
        taps.insert(name.clone(), Tap { sender: sender.clone(), receiver });
        self.counters.lock().unwrap().insert(name, BenchmarkCounter::new());
        Ok(sender)
    }

    pub fn snapshot(&self) -> HashMap<String, BenchmarkCounter> {
        self.counters.lock().unwrap().clone()
    }

    pub fn get(&self, name: &str) -> Option<BenchmarkCounter> {
        self.counters.lock().unwrap().get(name).copied()
    }

    /// Round-robin dispatcher: drains every channel's pending deltas each
    /// sweep, folding them into that tap's counter. Sleeps 100ms between
    /// sweeps once a full round processed fewer than 1024 updates, so an
    /// idle system costs near-zero CPU.
    pub async fn run(self: Arc<Self>, cancel: tokio_util::sync::CancellationToken) {
        self.started.store(true, Ordering::SeqCst);
        loop {
            if cancel.is_cancelled() {
                return;
            }

            let tap_names: Vec<String> = self.taps.lock().unwrap().keys().cloned().collect();
            let mut swept = 0u64;

            for name in tap_names {
                let mut accumulated = 0u64;
                loop {
                    let maybe = {
                        let taps = self.taps.lock().unwrap();
                        taps.get(&name).map(|t| t.receiver.try_recv())
                    };
                    match maybe {
                        Some(Ok(delta)) => {
                            accumulated += delta;
                            swept += 1;
                        }
                        _ => break,
                    }
                }
                if accumulated > 0 {
                    let now = Instant::now();
                    if let Some(counter) = self.counters.lock().unwrap().get_mut(&name) {
                        counter.accumulate(accumulated, now);
                    }
                }
            }

            if swept < IDLE_SWEEP_THRESHOLD {
                tokio::select! {
                    _ = tokio::time::sleep(IDLE_SLEEP) => {}
                    _ = cancel.cancelled() => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rps_is_computed_once_window_is_crossed() {
        let mut counter = BenchmarkCounter::new();
        let t0 = counter.last_rps_activation;
        counter.accumulate(RPS_WINDOW - 1, t0);
        assert_eq!(counter.rps, 0);
        assert_eq!(counter.last_rps_value, 0);

        let t1 = t0 + Duration::from_secs(1);
        counter.accumulate(2, t1);
        assert_eq!(counter.processed, RPS_WINDOW + 1);
        assert_eq!(counter.last_rps_value, RPS_WINDOW + 1);
        assert_eq!(counter.next_rps_value, RPS_WINDOW + 1 + RPS_WINDOW);
        assert_eq!(counter.rps, RPS_WINDOW + 1);
    }

    #[test]
    fn processed_is_monotonically_non_decreasing() {
        let mut counter = BenchmarkCounter::new();
        let mut now = counter.last_rps_activation;
        let mut last = 0u64;
        for _ in 0..10 {
            now += Duration::from_millis(50);
            counter.accumulate(37, now);
            assert!(counter.processed >= last);
            last = counter.processed;
        }
    }

    #[tokio::test]
    async fn register_after_start_fails() {
        let registry = BenchmarkRegistry::new();
        let cancel = tokio_util::sync::CancellationToken::new();
        registry.register("input").unwrap();

        let handle = tokio::spawn({
            let registry = registry.clone();
            let cancel = cancel.clone();
            async move { registry.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.register("late").is_err());

        cancel.cancel();
        handle.await.unwrap();
    }
}
