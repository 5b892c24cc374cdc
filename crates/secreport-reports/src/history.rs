//! Run records: in-memory ring buffer of the last runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

use secreport_core::{ScheduleRecord, SecReportError};

pub const HISTORY_LIMIT: usize = 100;

/// Orchestrator run states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Rendering,
    Composing,
    Delivering,
    CleaningUp,
    Done,
    ErrorCleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Cron,
    Manual,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub schedule_id: String,
    pub tenant: String,
    pub trigger: Trigger,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn start(record: &ScheduleRecord, trigger: Trigger) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            schedule_id: record.id.clone(),
            tenant: record.client.clone(),
            trigger,
            state: RunState::Idle,
            started_at: Utc::now(),
            finished_at: None,
            error_kind: None,
            error: None,
        }
    }

    pub fn transition(&mut self, next: RunState) {
        tracing::debug!(run_id = %self.run_id, from = ?self.state, to = ?next, "run state");
        self.state = next;
    }

    pub fn fail(&mut self, err: &SecReportError) {
        self.error_kind = Some(err.kind().to_string());
        self.error = Some(err.to_string());
    }

    pub fn finish(&mut self, state: RunState) {
        self.transition(state);
        self.finished_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> bool {
        self.state == RunState::Done && self.error.is_none()
    }
}

#[derive(Default)]
pub struct RunHistory {
    runs: Mutex<VecDeque<RunRecord>>,
}

impl RunHistory {
    pub fn record(&self, run: RunRecord) {
        if let Ok(mut runs) = self.runs.lock() {
            runs.push_back(run);
            while runs.len() > HISTORY_LIMIT {
                runs.pop_front();
            }
        }
    }

    /// Newest first.
    pub fn list(&self) -> Vec<RunRecord> {
        self.runs
            .lock()
            .map(|runs| runs.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}
