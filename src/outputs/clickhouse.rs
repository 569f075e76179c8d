use super::Output;
use crate::config::{optional_u64, require_str, OutputConfig};
use crate::core::Message;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

const DEFAULT_BATCH_SIZE: u64 = 100;
const DEFAULT_THRESHOLD_SECS: u64 = 60;
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const DATETIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy)]
enum ColumnType {
    Int,
    Float,
    Datetime,
    String,
}

impl ColumnType {
    fn parse(name: &str) -> Self {
        match name {
            "int" => Self::Int,
            "float" => Self::Float,
            "datetime" => Self::Datetime,
            _ => Self::String,
        }
    }
}

struct Column {
    name: String,
    kind: ColumnType,
}

/// Buffers messages into a batch of B (default 100), flushing when the
/// batch fills or `threshold` seconds have elapsed since the last flush
/// (default 60). The column set is only known at runtime (from
/// configuration), so a flush builds a multi-row `INSERT INTO table
/// (fields…) VALUES (…), (…), …` statement rather than binding against a
/// compile-time row struct, with every value escaped per its configured
/// typing (`int`, `float`, `datetime` reformatted through the configured
/// layout, default `string`). A per-row bind error is logged and that row
/// is skipped; a whole-flush failure is retried with 5-second backoff until
/// it succeeds — unlike redis, a clickhouse flush never gives up.
pub struct ClickhouseOutput {
    url: String,
    database: Option<String>,
    table: String,
    columns: Vec<Column>,
    batch_size: u64,
    threshold: Duration,
}

impl ClickhouseOutput {
    pub fn new(cfg: &OutputConfig) -> anyhow::Result<Self> {
        let url = require_str(&cfg.options, "clickhouse", &cfg.name, "url")?.to_string();
        let database = cfg.options.get("database").and_then(|v| v.as_str()).map(str::to_string);
        let table = require_str(&cfg.options, "clickhouse", &cfg.name, "table")?.to_string();

        let fields = cfg
            .options
            .get("fields")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("clickhouse output '{}': missing required array option 'fields'", cfg.name))?;

        let columns = fields
            .iter()
            .map(|f| {
                let name = f.get("name").and_then(|v| v.as_str()).ok_or_else(|| {
                    anyhow::anyhow!("clickhouse output '{}': each field entry needs a 'name'", cfg.name)
                })?;
                let kind = f.get("type").and_then(|v| v.as_str()).map(ColumnType::parse).unwrap_or(ColumnType::String);
                Ok(Column { name: name.to_string(), kind })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let batch_size = optional_u64(&cfg.options, "batch_size").unwrap_or(DEFAULT_BATCH_SIZE);
        let threshold = Duration::from_secs(optional_u64(&cfg.options, "threshold").unwrap_or(DEFAULT_THRESHOLD_SECS));

        Ok(Self { url, database, table, columns, batch_size, threshold })
    }

    /// Renders one column's bound literal, applying the configured typing.
    /// Missing payload keys bind as empty string / zero rather than failing
    /// the row. Returns `None` on a type mismatch the row should skip for.
    fn bind_column(&self, column: &Column, msg: &Message) -> Option<String> {
        let raw = msg.payload.get(&column.name).map(String::as_str).unwrap_or("");
        Some(match column.kind {
            ColumnType::Int => {
                let n: i64 = if raw.is_empty() { 0 } else { raw.parse().ok()? };
                n.to_string()
            }
            ColumnType::Float => {
                let f: f64 = if raw.is_empty() { 0.0 } else { raw.parse().ok()? };
                f.to_string()
            }
            ColumnType::Datetime => {
                let formatted = if raw.is_empty() {
                    String::new()
                } else {
                    NaiveDateTime::parse_from_str(raw, DATETIME_LAYOUT)
                        .map(|dt| dt.format(DATETIME_LAYOUT).to_string())
                        .ok()?
                };
                format!("'{}'", escape_literal(&formatted))
            }
            ColumnType::String => format!("'{}'", escape_literal(raw)),
        })
    }

    fn build_insert(&self, batch: &[Message]) -> (String, u64) {
        let field_list = self.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ");
        let mut sql = format!("INSERT INTO {} ({field_list}) VALUES ", self.table);

        let mut committed = 0u64;
        let mut rows_rendered = Vec::with_capacity(batch.len());
        for msg in batch {
            let mut values = Vec::with_capacity(self.columns.len());
            let mut ok = true;
            for column in &self.columns {
                match self.bind_column(column, msg) {
                    Some(v) => values.push(v),
                    None => {
                        tracing::warn!(column = %column.name, "clickhouse output: failed to bind column, skipping row");
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                rows_rendered.push(format!("({})", values.join(", ")));
                committed += 1;
            }
        }

        let _ = write!(sql, "{}", rows_rendered.join(", "));
        (sql, committed)
    }

    fn client(&self) -> clickhouse::Client {
        let mut client = clickhouse::Client::default().with_url(&self.url);
        if let Some(db) = &self.database {
            client = client.with_database(db);
        }
        client
    }

    async fn flush(&self, batch: &[Message]) -> anyhow::Result<u64> {
        let (sql, committed) = self.build_insert(batch);
        if committed == 0 {
            return Ok(0);
        }
        self.client().query(&sql).execute().await?;
        Ok(committed)
    }

    async fn flush_with_retry(&self, batch: &[Message], counter: &flume::Sender<u64>) {
        loop {
            match self.flush(batch).await {
                Ok(committed) => {
                    if committed > 0 {
                        let _ = counter.send_async(committed).await;
                    }
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "clickhouse output: flush failed, retrying");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                }
            }
        }
    }
}

fn escape_literal(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl Output for ClickhouseOutput {
    async fn run(
        &mut self,
        cancel: tokio_util::sync::CancellationToken,
        input: flume::Receiver<Message>,
        _runtime_options: HashMap<String, String>,
        counter: flume::Sender<u64>,
    ) {
        let mut batch: Vec<Message> = Vec::with_capacity(self.batch_size as usize);
        let mut last_flush = Instant::now();

        loop {
            let wait = self.threshold.saturating_sub(last_flush.elapsed());
            let recv = tokio::select! {
                _ = cancel.cancelled() => None,
                recv = input.recv_async() => Some(recv),
                _ = tokio::time::sleep(wait) => None,
            };

            match recv {
                Some(Ok(msg)) => batch.push(msg),
                Some(Err(_)) => {
                    if !batch.is_empty() {
                        self.flush_with_retry(&batch, &counter).await;
                    }
                    break;
                }
                None => {}
            }

            let should_flush = (batch.len() as u64) >= self.batch_size || (!batch.is_empty() && last_flush.elapsed() >= self.threshold);
            if should_flush {
                self.flush_with_retry(&batch, &counter).await;
                batch.clear();
                last_flush = Instant::now();
            }

            if cancel.is_cancelled() {
                if !batch.is_empty() {
                    self.flush_with_retry(&batch, &counter).await;
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output() -> ClickhouseOutput {
        ClickhouseOutput {
            url: "http://localhost:8123".into(),
            database: None,
            table: "events".into(),
            columns: vec![
                Column { name: "count".into(), kind: ColumnType::Int },
                Column { name: "ratio".into(), kind: ColumnType::Float },
                Column { name: "seen_at".into(), kind: ColumnType::Datetime },
                Column { name: "content".into(), kind: ColumnType::String },
            ],
            batch_size: DEFAULT_BATCH_SIZE,
            threshold: Duration::from_secs(DEFAULT_THRESHOLD_SECS),
        }
    }

    #[test]
    fn missing_payload_keys_bind_as_empty_string_or_zero() {
        let output = sample_output();
        let msg = Message::new("h", "c");
        assert_eq!(output.bind_column(&output.columns[0], &msg), Some("0".to_string()));
        assert_eq!(output.bind_column(&output.columns[1], &msg), Some("0".to_string()));
    }

    #[test]
    fn datetime_column_reformats_through_the_configured_layout() {
        let output = sample_output();
        let mut msg = Message::new("h", "c");
        msg.payload.insert("seen_at".to_string(), "2024-01-02 03:04:05".to_string());
        assert_eq!(output.bind_column(&output.columns[2], &msg), Some("'2024-01-02 03:04:05'".to_string()));
    }

    #[test]
    fn string_literal_escapes_embedded_quotes() {
        let output = sample_output();
        let mut msg = Message::new("h", "c");
        msg.payload.insert("content".to_string(), "it's here".to_string());
        assert_eq!(output.bind_column(&output.columns[3], &msg), Some("'it\\'s here'".to_string()));
    }

    #[test]
    fn build_insert_renders_one_row_per_message() {
        let output = sample_output();
        let batch = vec![Message::new("h", "c1"), Message::new("h", "c2")];
        let (sql, committed) = output.build_insert(&batch);
        assert_eq!(committed, 2);
        assert!(sql.starts_with("INSERT INTO events (count, ratio, seen_at, content) VALUES "));
        assert_eq!(sql.matches("), (").count(), 1);
    }
}
