use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stage::StageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub stage: StageKind,
    pub total_trackers: usize,
    pub domain_groups: usize,
    pub deferred_trackers: Vec<String>,
    pub necessary_trackers: Vec<String>,
}

impl SessionReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
