//! Job Scheduler: one tokio timer task per named job.
//! Re-registering a name aborts the previous timer first, so a name never
//! has more than one live timer.

use ::cron::Schedule;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tokio::task::JoinHandle;

use secreport_core::{Result, SecReportError};

struct Job {
    expression: String,
    timer: JoinHandle<()>,
}

pub struct JobScheduler {
    tz: FixedOffset,
    jobs: Mutex<HashMap<String, Job>>,
}

impl JobScheduler {
    /// Scheduler evaluating every expression in `tz`.
    pub fn new(tz: FixedOffset) -> Self {
        Self {
            tz,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn timezone(&self) -> FixedOffset {
        self.tz
    }

    /// Install `callback` under `name`, replacing any job already using it.
    /// Each firing spawns the callback on its own task; stopping the job
    /// does not cancel runs already started.
    pub fn schedule<F, Fut>(&self, name: &str, expression: &str, callback: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let schedule = crate::cron::parse(expression)?;
        let tz = self.tz;
        let job = name.to_string();

        let mut jobs = self.lock()?;
        if let Some(old) = jobs.remove(name) {
            old.timer.abort();
            tracing::debug!(job = %name, old = %old.expression, "replaced job");
        }

        let timer = tokio::spawn(async move {
            let mut last = None;
            loop {
                let now = Utc::now().with_timezone(&tz);
                let Some(next) = following_fire(&schedule, now, last) else {
                    tracing::warn!(job = %job, "cron expression has no future firing, timer stopped");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                tracing::info!(job = %job, at = %next, "⏰ Job fired");
                tokio::spawn(callback());
                last = Some(next);
            }
        });

        jobs.insert(
            name.to_string(),
            Job {
                expression: expression.to_string(),
                timer,
            },
        );
        tracing::info!(job = %name, expression = %expression, "📅 Job scheduled");
        Ok(())
    }

    /// Cancel and remove a job. Returns whether it existed.
    pub fn stop(&self, name: &str) -> bool {
        let removed = self.jobs.lock().ok().and_then(|mut jobs| jobs.remove(name));
        match removed {
            Some(job) => {
                job.timer.abort();
                tracing::info!(job = %name, "Job stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every job.
    pub fn stop_all(&self) {
        for name in self.list() {
            self.stop(&name);
        }
    }

    /// Registered job names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .jobs
            .lock()
            .map(|jobs| jobs.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn expression(&self, name: &str) -> Option<String> {
        self.jobs
            .lock()
            .ok()
            .and_then(|jobs| jobs.get(name).map(|j| j.expression.clone()))
    }

    /// Next firing of `name` in the scheduler's timezone.
    pub fn next_fire(&self, name: &str) -> Option<DateTime<FixedOffset>> {
        let expression = self.expression(name)?;
        let now = Utc::now().with_timezone(&self.tz);
        crate::cron::next_fire(&expression, &now).ok().flatten()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Job>>> {
        self.jobs
            .lock()
            .map_err(|e| SecReportError::Scheduler(format!("job table lock: {e}")))
    }
}

/// Next firing strictly after both `now` and the slot that last fired.
/// A timer that wakes slightly before its wall-clock target would
/// otherwise see the same slot again.
fn following_fire(
    schedule: &Schedule,
    now: DateTime<FixedOffset>,
    last: Option<DateTime<FixedOffset>>,
) -> Option<DateTime<FixedOffset>> {
    let from = last.map_or(now, |last| last.max(now));
    schedule.after(&from).next()
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        if let Ok(jobs) = self.jobs.get_mut() {
            for job in jobs.values() {
                job.timer.abort();
            }
        }
    }
}
