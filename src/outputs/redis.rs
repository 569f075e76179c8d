use super::{substitute_template, Output};
use crate::config::{optional_u64, require_str, OutputConfig};
use crate::core::Message;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use ::redis::AsyncCommands;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

const DEFAULT_BATCH_SIZE: u64 = 1_000;
const MAX_FLUSH_ATTEMPTS: u64 = 32;

/// Buffers messages into batches of `batch_size` and right-pushes each batch
/// to a (template-expanded) Redis list key. On failure, retries the whole
/// batch with `2*attempt` seconds of backoff, reconnecting between attempts,
/// up to 32 times before logging and dropping the batch. When
/// `compress_batch` is set, that many JSON-encoded messages are accumulated,
/// encoded as a JSON array, gzip-compressed at best compression, and pushed
/// as a single batch element — the mirror of the redis input's decompression.
pub struct RedisOutput {
    servers: String,
    key_template: String,
    batch_size: u64,
    compress_batch: u64,
}

impl RedisOutput {
    pub fn new(cfg: &OutputConfig) -> anyhow::Result<Self> {
        let servers = require_str(&cfg.options, "redis", &cfg.name, "servers")?.to_string();
        let key_template = require_str(&cfg.options, "redis", &cfg.name, "key")?.to_string();
        let batch_size = optional_u64(&cfg.options, "batch_size").unwrap_or(DEFAULT_BATCH_SIZE);
        let compress_batch = optional_u64(&cfg.options, "compress_batch").unwrap_or(0);
        Ok(Self { servers, key_template, batch_size, compress_batch })
    }

    fn encode_batch(&self, batch: &[Message]) -> anyhow::Result<Vec<Vec<u8>>> {
        if self.compress_batch > 0 {
            let json = serde_json::to_vec(batch)?;
            let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(&json)?;
            Ok(vec![encoder.finish()?])
        } else {
            batch.iter().map(|m| Ok(serde_json::to_vec(m)?)).collect()
        }
    }

    async fn flush(&self, conn: &mut ::redis::aio::ConnectionManager, key: &str, elements: &[Vec<u8>]) -> anyhow::Result<()> {
        let _: () = conn.rpush(key, elements).await?;
        Ok(())
    }

    /// Encodes and pushes one full batch, retrying the whole batch with
    /// `2*attempt` seconds of backoff (reconnecting between attempts) up to
    /// `MAX_FLUSH_ATTEMPTS` before logging and dropping it.
    async fn flush_batch(
        &self,
        client: &::redis::Client,
        conn: &mut ::redis::aio::ConnectionManager,
        key: &str,
        batch: &[Message],
        counter: &flume::Sender<u64>,
    ) {
        let elements = match self.encode_batch(batch) {
            Ok(e) => e,
            Err(e) => {
                tracing::error!(error = %e, "redis output: failed to encode batch, dropping it");
                return;
            }
        };

        let count = batch.len() as u64;
        let mut attempt: u64 = 0;
        loop {
            match self.flush(conn, key, &elements).await {
                Ok(()) => {
                    let _ = counter.send_async(count).await;
                    break;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_FLUSH_ATTEMPTS {
                        tracing::error!(error = %e, attempts = attempt, "redis output: exhausted retries, dropping batch");
                        break;
                    }
                    tracing::warn!(error = %e, attempt, "redis output: flush failed, retrying");
                    tokio::time::sleep(Duration::from_secs(2 * attempt)).await;
                    if let Ok(new_conn) = client.get_connection_manager().await {
                        *conn = new_conn;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Output for RedisOutput {
    async fn run(
        &mut self,
        cancel: tokio_util::sync::CancellationToken,
        input: flume::Receiver<Message>,
        runtime_options: HashMap<String, String>,
        counter: flume::Sender<u64>,
    ) {
        let key = substitute_template(&self.key_template, &runtime_options);

        let client = match ::redis::Client::open(self.servers.as_str()) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "redis output: invalid connection string");
                return;
            }
        };
        let mut conn = match client.get_connection_manager().await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "redis output: initial connection failed");
                return;
            }
        };

        let mut batch: Vec<Message> = Vec::with_capacity(self.batch_size as usize);
        let effective_batch_size = if self.compress_batch > 0 { self.compress_batch } else { self.batch_size };

        loop {
            let recv = tokio::select! {
                _ = cancel.cancelled() => None,
                recv = input.recv_async() => recv.ok(),
            };

            let Some(msg) = recv else {
                if !batch.is_empty() {
                    self.flush_batch(&client, &mut conn, &key, &batch, &counter).await;
                }
                break;
            };
            batch.push(msg);

            if (batch.len() as u64) < effective_batch_size {
                continue;
            }

            self.flush_batch(&client, &mut conn, &key, &batch, &counter).await;
            batch.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_uncompressed_batch_as_one_element_per_message() {
        let output = RedisOutput {
            servers: "redis://localhost".into(),
            key_template: "k".into(),
            batch_size: DEFAULT_BATCH_SIZE,
            compress_batch: 0,
        };
        let batch = vec![Message::new("h", "c1"), Message::new("h", "c2")];
        let encoded = output.encode_batch(&batch).unwrap();
        assert_eq!(encoded.len(), 2);
    }

    #[test]
    fn encodes_compressed_batch_as_a_single_gzip_element() {
        let output = RedisOutput {
            servers: "redis://localhost".into(),
            key_template: "k".into(),
            batch_size: DEFAULT_BATCH_SIZE,
            compress_batch: 2,
        };
        let batch = vec![Message::new("h", "c1"), Message::new("h", "c2")];
        let encoded = output.encode_batch(&batch).unwrap();
        assert_eq!(encoded.len(), 1);
    }
}
