use super::Input;
use crate::config::{optional_bool, optional_str, optional_u64, require_str, InputConfig};
use crate::core::Message;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use redis::AsyncCommands;
use std::io::Read;
use std::time::Duration;

const DEFAULT_BATCH_SIZE: u64 = 10_000;
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
const POP_TIMEOUT_SECS: f64 = 1.0;

enum Mode {
    Pop,
    RangeTrim,
}

/// Reads from a Redis list used as a queue. `pop` blocking-pops one element
/// at a time; `range-trim` batch-reads up to `batch_size` elements and
/// left-trims them off, asserting no other reader shares the key. Optionally
/// treats each element as a gzip-compressed JSON array of messages (the
/// mirror of the redis output's `compress_batch` option). Reconnects with a
/// 1-second backoff on connection loss, retrying indefinitely, the same
/// idiom the teacher's `TcpConnection` uses for its own reconnect loop.
pub struct RedisInput {
    servers: String,
    key: String,
    mode: Mode,
    batch_size: u64,
    compressed: bool,
}

impl RedisInput {
    pub fn new(cfg: &InputConfig) -> anyhow::Result<Self> {
        let servers = require_str(&cfg.options, "redis", &cfg.name, "servers")?.to_string();
        let key = require_str(&cfg.options, "redis", &cfg.name, "key")?.to_string();
        let mode = match optional_str(&cfg.options, "mode").as_deref() {
            Some("range_trim") | Some("range-trim") => Mode::RangeTrim,
            Some("pop") | None => Mode::Pop,
            Some(other) => anyhow::bail!("redis input '{}': invalid mode '{}'", cfg.name, other),
        };
        let batch_size = optional_u64(&cfg.options, "batch_size").unwrap_or(DEFAULT_BATCH_SIZE);
        let compressed = optional_bool(&cfg.options, "compressed").unwrap_or(false);

        Ok(Self { servers, key, mode, batch_size, compressed })
    }

    fn decode_element(&self, raw: &[u8]) -> Vec<Message> {
        if self.compressed {
            let mut decoder = GzDecoder::new(raw);
            let mut decompressed = Vec::new();
            if decoder.read_to_end(&mut decompressed).is_err() {
                tracing::warn!("redis input: failed to gunzip batch element");
                return Vec::new();
            }
            match serde_json::from_slice::<Vec<Message>>(&decompressed) {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(error = %e, "redis input: failed to decode compressed batch");
                    Vec::new()
                }
            }
        } else {
            match serde_json::from_slice::<Message>(raw) {
                Ok(msg) => vec![msg],
                Err(e) => {
                    tracing::warn!(error = %e, "redis input: failed to decode element");
                    Vec::new()
                }
            }
        }
    }
}

#[async_trait]
impl Input for RedisInput {
    async fn run(
        &mut self,
        cancel: tokio_util::sync::CancellationToken,
        output: flume::Sender<Message>,
        counter: flume::Sender<u64>,
    ) {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            let client = match redis::Client::open(self.servers.as_str()) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "redis input: invalid connection string");
                    return;
                }
            };
            let mut conn = match client.get_connection_manager().await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(error = %e, "redis input: connection failed, retrying");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    continue;
                }
            };

            loop {
                if cancel.is_cancelled() {
                    return;
                }

                let batch: Vec<Message> = match self.mode {
                    Mode::Pop => {
                        let popped: Option<(String, Vec<u8>)> = match conn.blpop(&self.key, POP_TIMEOUT_SECS).await {
                            Ok(v) => v,
                            Err(e) => {
                                tracing::warn!(error = %e, "redis input: blpop failed, reconnecting");
                                break;
                            }
                        };
                        match popped {
                            Some((_, raw)) => self.decode_element(&raw),
                            None => continue,
                        }
                    }
                    Mode::RangeTrim => {
                        let items: Vec<Vec<u8>> = match conn.lrange(&self.key, 0, (self.batch_size as isize) - 1).await {
                            Ok(v) => v,
                            Err(e) => {
                                tracing::warn!(error = %e, "redis input: lrange failed, reconnecting");
                                break;
                            }
                        };
                        if items.is_empty() {
                            tokio::time::sleep(Duration::from_millis(200)).await;
                            continue;
                        }
                        if let Err(e) = conn.ltrim::<_, ()>(&self.key, items.len() as isize, -1).await {
                            tracing::warn!(error = %e, "redis input: ltrim failed, reconnecting");
                            break;
                        }
                        items.iter().flat_map(|raw| self.decode_element(raw)).collect()
                    }
                };

                if batch.is_empty() {
                    continue;
                }

                let count = batch.len() as u64;
                for msg in batch {
                    if output.send_async(msg).await.is_err() {
                        return;
                    }
                }
                let _ = counter.send_async(count).await;
            }

            tokio::time::sleep(RECONNECT_BACKOFF).await;
        }
    }

    fn is_multi_thread(&self) -> bool {
        true
    }
}
