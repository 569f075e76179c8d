use super::Output;
use crate::config::OutputConfig;
use crate::core::Message;
use async_trait::async_trait;
use std::collections::HashMap;

/// JSON-encodes and prints every message as it arrives. No batching, no
/// backpressure beyond the input queue itself.
pub struct StdoutOutput;

impl StdoutOutput {
    pub fn new(_cfg: &OutputConfig) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Output for StdoutOutput {
    async fn run(
        &mut self,
        cancel: tokio_util::sync::CancellationToken,
        input: flume::Receiver<Message>,
        _runtime_options: HashMap<String, String>,
        counter: flume::Sender<u64>,
    ) {
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => break,
                recv = input.recv_async() => match recv {
                    Ok(msg) => msg,
                    Err(_) => break,
                },
            };

            match serde_json::to_string(&msg) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::warn!(error = %e, "stdout output: failed to encode message"),
            }

            let _ = counter.send_async(1).await;
        }
    }
}
