use super::benchmark::BenchmarkCounter;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkView {
    pub processed: u64,
    pub rps: u64,
}

impl From<BenchmarkCounter> for BenchmarkView {
    fn from(c: BenchmarkCounter) -> Self {
        Self { processed: c.processed, rps: c.rps }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueView {
    pub name: String,
    pub size: usize,
    pub benchmark: Option<BenchmarkView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    #[serde(rename = "In")]
    pub input: QueueView,
    #[serde(rename = "Filters")]
    pub filters: Vec<QueueView>,
    #[serde(rename = "Out")]
    pub output: QueueView,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct StatusSnapshot {
    #[serde(rename = "Pipelines")]
    pub pipelines: Vec<PipelineStatus>,
}
