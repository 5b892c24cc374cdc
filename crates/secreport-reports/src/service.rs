//! Schedule Store service: the authoritative schedule set, its scheduler
//! jobs, and its persisted copy under `schedule_configs`.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use secreport_core::{
    ConfigStore, Result, ScheduleRecord, SecReportError, SCHEDULE_CONFIGS_KEY,
};
use secreport_scheduler::{JobScheduler, cron_expression};

use crate::history::{RunRecord, Trigger};
use crate::orchestrator::ReportOrchestrator;

pub struct ScheduleService {
    store: Arc<dyn ConfigStore>,
    scheduler: Arc<JobScheduler>,
    orchestrator: Arc<ReportOrchestrator>,
    records: Mutex<Vec<ScheduleRecord>>,
}

impl ScheduleService {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        scheduler: Arc<JobScheduler>,
        orchestrator: Arc<ReportOrchestrator>,
    ) -> Self {
        Self {
            store,
            scheduler,
            orchestrator,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }

    pub fn orchestrator(&self) -> &Arc<ReportOrchestrator> {
        &self.orchestrator
    }

    /// Load the persisted set and install its enabled jobs. Returns the
    /// number of records loaded. Elements that do not parse as a record
    /// are logged and dropped; the rest still load.
    pub async fn load(&self) -> Result<usize> {
        let stored = self.store.get(SCHEDULE_CONFIGS_KEY).await?;
        let elements = match stored {
            Some(Value::Array(elements)) => elements,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(SecReportError::Store(format!(
                    "{SCHEDULE_CONFIGS_KEY} is not an array: {other}"
                )));
            }
        };
        let records: Vec<ScheduleRecord> = elements
            .into_iter()
            .enumerate()
            .filter_map(|(index, element)| {
                serde_json::from_value(element)
                    .map_err(|e| tracing::warn!(index, error = %e, "skipping unreadable stored schedule"))
                    .ok()
            })
            .collect();
        let mut current = self.records.lock().await;
        self.install(&records);
        *current = records;
        tracing::info!(count = current.len(), "Loaded schedules from store");
        Ok(current.len())
    }

    pub async fn list(&self) -> Vec<ScheduleRecord> {
        self.records.lock().await.clone()
    }

    /// Replace the whole set: stop every job, schedule the enabled records,
    /// then persist. Jobs are already reconciled when persistence fails.
    pub async fn replace_all(&self, records: Vec<ScheduleRecord>) -> Result<()> {
        for record in &records {
            record.validate()?;
        }

        let mut current = self.records.lock().await;
        self.install(&records);
        *current = records;

        let value = serde_json::to_value(&*current)?;
        self.store.set(SCHEDULE_CONFIGS_KEY, &value).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to save schedules to store");
            SecReportError::Store(format!(
                "Schedules updated in memory but failed to save: {e}"
            ))
        })?;
        tracing::info!(count = current.len(), "Schedules updated and saved");
        Ok(())
    }

    /// Start a manual run for `id`, or for the first enabled record when no
    /// id is given. The run proceeds in the background; the returned record
    /// is the one that was started.
    pub async fn trigger(&self, id: Option<&str>) -> Result<ScheduleRecord> {
        let record = {
            let current = self.records.lock().await;
            match id.filter(|s| !s.is_empty()) {
                Some(id) => current.iter().find(|r| r.id == id).cloned(),
                None => current.iter().find(|r| r.is_enabled).cloned(),
            }
        }
        .ok_or_else(|| SecReportError::ScheduleNotFound(id.unwrap_or("<first enabled>").to_string()))?;

        let slot = self.orchestrator.try_begin(&record.id)?;
        let orchestrator = self.orchestrator.clone();
        let run_record = record.clone();
        tokio::spawn(async move {
            orchestrator.execute(&run_record, Trigger::Manual, slot).await;
        });
        tracing::info!(schedule_id = %record.id, tenant = %record.client, "Report generation triggered");
        Ok(record)
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.orchestrator.history()
    }

    fn install(&self, records: &[ScheduleRecord]) {
        self.scheduler.stop_all();
        for record in records.iter().filter(|r| r.is_enabled) {
            let expression = match cron_expression(record) {
                Ok(expr) => expr,
                Err(e) => {
                    tracing::warn!(schedule_id = %record.id, error = %e, "skipping invalid schedule");
                    continue;
                }
            };
            let orchestrator = self.orchestrator.clone();
            let job_record = record.clone();
            let scheduled = self.scheduler.schedule(&record.job_name(), &expression, move || {
                let orchestrator = orchestrator.clone();
                let record = job_record.clone();
                async move {
                    if let Err(e) = orchestrator.run(&record, Trigger::Cron).await {
                        tracing::warn!(schedule_id = %record.id, error = %e, "cron firing skipped");
                    }
                }
            });
            if let Err(e) = scheduled {
                tracing::warn!(schedule_id = %record.id, error = %e, "failed to schedule");
            }
        }
    }
}
