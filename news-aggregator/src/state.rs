use crate::types::CycleReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::RwLock;

/// Where the coordinator is within a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStage {
    #[default]
    Idle,
    Fetching,
    Deduplicating,
    Categorizing,
    Summarizing,
    Pruning,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Idle => "idle",
            CycleStage::Fetching => "fetching",
            CycleStage::Deduplicating => "deduplicating",
            CycleStage::Categorizing => "categorizing",
            CycleStage::Summarizing => "summarizing",
            CycleStage::Pruning => "pruning",
        };
        f.write_str(name)
    }
}

/// Per-source error summary from the last cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SourceErrorSummary {
    pub source: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub stage: CycleStage,
    pub cycles_completed: u64,
    pub last_cycle_started: Option<DateTime<Utc>>,
    pub last_cycle_finished: Option<DateTime<Utc>>,
    pub last_successful_cycle: Option<DateTime<Utc>>,
    pub source_errors: Vec<SourceErrorSummary>,
    pub last_report: Option<CycleReport>,
}

/// Status shared between the coordinator (single writer) and the web surface.
/// Locks are held only for the copy in or out, never across a stage.
#[derive(Debug, Default)]
pub struct PipelineStatus {
    inner: RwLock<StatusSnapshot>,
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().await.clone()
    }

    pub async fn stage(&self) -> CycleStage {
        self.inner.read().await.stage
    }

    pub(crate) async fn set_stage(&self, stage: CycleStage) {
        self.inner.write().await.stage = stage;
    }

    pub(crate) async fn cycle_started(&self, at: DateTime<Utc>) {
        let mut status = self.inner.write().await;
        status.last_cycle_started = Some(at);
    }

    pub(crate) async fn cycle_finished(&self, report: &CycleReport) {
        let mut status = self.inner.write().await;
        status.stage = CycleStage::Idle;
        status.cycles_completed += 1;
        status.last_cycle_finished = report.finished_at;
        if report.is_successful() {
            status.last_successful_cycle = report.finished_at;
        }
        status.source_errors = report
            .sources
            .iter()
            .filter(|s| !s.errors.is_empty())
            .map(|s| SourceErrorSummary {
                source: s.source.clone(),
                errors: s.errors.clone(),
            })
            .collect();
        status.last_report = Some(report.clone());
    }
}
