use super::Input;
use crate::config::{optional_str, optional_u64, InputConfig};
use crate::core::Message;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use tokio::net::UdpSocket;

const DEFAULT_IP: &str = "0.0.0.0";
const DEFAULT_PORT: u64 = 514;

/// RFC3164-over-UDP syslog listener. No crate in the reference corpus parses
/// this wire format, so the datagram is parsed by hand: strip the leading
/// `<PRI>`, read the fixed-width "Mmm dd hh:mm:ss" timestamp (which carries
/// no year — the current year is assumed), then hostname, then message.
/// Single-threaded: the listener owns the one UDP socket exclusively.
pub struct SyslogInput {
    bind_addr: String,
}

impl SyslogInput {
    pub fn new(cfg: &InputConfig) -> anyhow::Result<Self> {
        let ip = optional_str(&cfg.options, "ip").unwrap_or_else(|| DEFAULT_IP.to_string());
        let port = optional_u64(&cfg.options, "port").unwrap_or(DEFAULT_PORT);
        Ok(Self { bind_addr: format!("{ip}:{port}") })
    }
}

fn parse_rfc3164(datagram: &str) -> (DateTime<Utc>, String, String) {
    let body = match datagram.find('>') {
        Some(idx) if datagram.starts_with('<') => &datagram[idx + 1..],
        _ => datagram,
    };

    if body.len() > 15 {
        let (ts_str, rest) = body.split_at(15);
        let rest = rest.trim_start();
        let year = Utc::now().year();
        let with_year = format!("{year} {ts_str}");

        if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, "%Y %b %e %H:%M:%S") {
            let accept_time = Utc.from_utc_datetime(&naive);
            if let Some(sp) = rest.find(' ') {
                let hostname = rest[..sp].to_string();
                let content = rest[sp + 1..].to_string();
                return (accept_time, hostname, content);
            }
            return (accept_time, String::new(), rest.to_string());
        }
    }

    (Utc::now(), String::new(), datagram.to_string())
}

#[async_trait]
impl Input for SyslogInput {
    async fn run(
        &mut self,
        cancel: tokio_util::sync::CancellationToken,
        output: flume::Sender<Message>,
        counter: flume::Sender<u64>,
    ) {
        let socket = match UdpSocket::bind(&self.bind_addr).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(addr = %self.bind_addr, error = %e, "syslog input: failed to bind");
                return;
            }
        };
        tracing::info!(addr = %self.bind_addr, "syslog input listening");

        let mut buf = [0u8; 65536];
        loop {
            let recv = tokio::select! {
                _ = cancel.cancelled() => break,
                recv = socket.recv_from(&mut buf) => recv,
            };

            let (len, _peer) = match recv {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "syslog input: recv error");
                    continue;
                }
            };

            let datagram = String::from_utf8_lossy(&buf[..len]);
            let (accept_time, hostname, content) = parse_rfc3164(&datagram);

            let mut msg = Message::new(hostname, content);
            msg.accept_time = accept_time;

            if output.send_async(msg).await.is_err() {
                break;
            }
            let _ = counter.send_async(1).await;
        }

        tracing::info!(addr = %self.bind_addr, "syslog input exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hostname_and_content() {
        let (_, hostname, content) = parse_rfc3164("<34>Oct 11 22:14:15 myhost myapp: something happened");
        assert_eq!(hostname, "myhost");
        assert_eq!(content, "myapp: something happened");
    }

    #[test]
    fn falls_back_to_raw_content_on_unparseable_input() {
        let (_, hostname, content) = parse_rfc3164("not a syslog line at all");
        assert_eq!(hostname, "");
        assert_eq!(content, "not a syslog line at all");
    }
}
