mod redis;
mod syslog;

use crate::config::InputConfig;
use crate::core::Message;
use async_trait::async_trait;

/// `accept(queue, counter_channel)`: reads from the configured source,
/// constructs messages, and publishes them. Every accepted batch of N
/// records is reported as an integer N on the counter channel.
#[async_trait]
pub trait Input: Send {
    async fn run(
        &mut self,
        cancel: tokio_util::sync::CancellationToken,
        output: flume::Sender<Message>,
        counter: flume::Sender<u64>,
    );

    /// Whether this input kind can usefully run with more than one worker.
    /// Non-multi-thread inputs (an exclusive listener) are instantiated
    /// exactly once regardless of the configured thread count.
    fn is_multi_thread(&self) -> bool {
        false
    }
}

pub fn build_input(cfg: &InputConfig) -> anyhow::Result<Box<dyn Input>> {
    let input: Box<dyn Input> = match cfg.plugin.as_str() {
        "syslog" => Box::new(syslog::SyslogInput::new(cfg)?),
        "redis" => Box::new(redis::RedisInput::new(cfg)?),
        other => anyhow::bail!("unknown input plugin '{other}'"),
    };
    Ok(input)
}
