use super::Filter;
use crate::config::{require_str, FilterConfig};
use crate::core::Message;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

const MIRROR_BUFFER_CAPACITY: usize = 1024;

/// Forwards every message downstream unchanged and opportunistically mirrors
/// its JSON encoding to any TCP client connected to a listening port. The
/// mirror write is best-effort: a bounded per-subscriber buffer means a slow
/// or absent reader drops mirrored messages rather than ever stalling the
/// main pipeline. Not thread-safe — instantiate at most one worker, the same
/// constraint the teacher's own TCP connection type documents for its
/// single-owner accept loop.
pub struct TcpTeeFilter {
    subscribers: Arc<Mutex<Vec<flume::Sender<String>>>>,
}

impl TcpTeeFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        let bind_addr = require_str(&cfg.options, "tcp_tee", &cfg.name, "bind")?.to_string();
        let subscribers: Arc<Mutex<Vec<flume::Sender<String>>>> = Arc::new(Mutex::new(Vec::new()));

        let accept_subscribers = subscribers.clone();
        let name = cfg.name.clone();
        tokio::spawn(async move {
            let listener = match TcpListener::bind(&bind_addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(filter = %name, error = %e, "tcp_tee: failed to bind {}", bind_addr);
                    return;
                }
            };
            tracing::info!(filter = %name, "tcp_tee listening on {}", bind_addr);

            loop {
                let (mut socket, peer) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(filter = %name, error = %e, "tcp_tee: accept failed");
                        continue;
                    }
                };

                let (tx, rx) = flume::bounded::<String>(MIRROR_BUFFER_CAPACITY);
                accept_subscribers.lock().unwrap().push(tx);

                tokio::spawn(async move {
                    while let Ok(line) = rx.recv_async().await {
                        if socket.write_all(line.as_bytes()).await.is_err() || socket.write_all(b"\n").await.is_err() {
                            tracing::debug!(peer = %peer, "tcp_tee: subscriber connection dropped");
                            break;
                        }
                    }
                });
            }
        });

        Ok(Self { subscribers })
    }
}

#[async_trait]
impl Filter for TcpTeeFilter {
    async fn process(&mut self, msg: Message) -> anyhow::Result<Option<Message>> {
        if let Ok(json) = serde_json::to_string(&msg) {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.retain(|tx| !matches!(tx.try_send(json.clone()), Err(flume::TrySendError::Disconnected(_))));
        }
        Ok(Some(msg))
    }
}
