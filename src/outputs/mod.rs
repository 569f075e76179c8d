mod clickhouse;
mod null;
mod redis;
mod stat;
mod stdout;

use crate::config::OutputConfig;
use crate::core::Message;
use async_trait::async_trait;
use std::collections::HashMap;

/// `read_from(queue, runtime_options, counter_channel)`: drains messages from
/// its input queue and durably commits them to a sink. `runtime_options` is
/// the per-worker variable map the orchestrator injects (at least `THREAD`),
/// substituted into any `${UPPER_SNAKE}` template in the output's own options
/// (e.g. a Redis key that varies per worker). Every time a batch of N records
/// is durably committed, N is sent on `counter_channel`.
#[async_trait]
pub trait Output: Send {
    async fn run(
        &mut self,
        cancel: tokio_util::sync::CancellationToken,
        input: flume::Receiver<Message>,
        runtime_options: HashMap<String, String>,
        counter: flume::Sender<u64>,
    );
}

pub fn build_output(cfg: &OutputConfig) -> anyhow::Result<Box<dyn Output>> {
    let output: Box<dyn Output> = match cfg.plugin.as_str() {
        "stdout" => Box::new(stdout::StdoutOutput::new(cfg)?),
        "null" => Box::new(null::NullOutput::new(cfg)?),
        "stat" => Box::new(stat::StatOutput::new(cfg)?),
        "redis" => Box::new(redis::RedisOutput::new(cfg)?),
        "clickhouse" => Box::new(clickhouse::ClickhouseOutput::new(cfg)?),
        other => anyhow::bail!("unknown output plugin '{other}'"),
    };
    Ok(output)
}

/// Substitutes `${UPPER_SNAKE}` placeholders in `template` with values from
/// `runtime_options` (the orchestrator's per-worker variable map). Unknown
/// placeholders are left verbatim.
pub(crate) fn substitute_template(template: &str, runtime_options: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            result.push_str(rest);
            return result;
        };
        result.push_str(&rest[..start]);
        let key = &rest[start + 2..start + end];
        match runtime_options.get(key) {
            Some(value) => result.push_str(value),
            None => {
                result.push_str("${");
                result.push_str(key);
                result.push('}');
            }
        }
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholder_and_leaves_unknown_verbatim() {
        let mut vars = HashMap::new();
        vars.insert("THREAD".to_string(), "3".to_string());
        assert_eq!(substitute_template("events:${THREAD}", &vars), "events:3");
        assert_eq!(substitute_template("events:${MISSING}", &vars), "events:${MISSING}");
    }
}
