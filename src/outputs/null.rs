use super::Output;
use crate::config::OutputConfig;
use crate::core::Message;
use async_trait::async_trait;
use std::collections::HashMap;

/// Drains its input queue silently. Used in benchmarking pipelines where the
/// terminal sink's cost should not be part of what's being measured.
pub struct NullOutput;

impl NullOutput {
    pub fn new(_cfg: &OutputConfig) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Output for NullOutput {
    async fn run(
        &mut self,
        cancel: tokio_util::sync::CancellationToken,
        input: flume::Receiver<Message>,
        _runtime_options: HashMap<String, String>,
        counter: flume::Sender<u64>,
    ) {
        loop {
            let recv = tokio::select! {
                _ = cancel.cancelled() => break,
                recv = input.recv_async() => recv,
            };
            if recv.is_err() {
                break;
            }
            let _ = counter.send_async(1).await;
        }
    }
}
