//! Report Orchestrator: render → compose → deliver → clean up.
//!
//! ```text
//! Idle → Rendering → Composing → Delivering → CleaningUp → Done
//!            └──────────────→ ErrorCleanup (render failed, nothing on disk)
//! ```
//!
//! Every failure is caught here, logged with the schedule and tenant, and
//! written to the run history. Nothing propagates into the scheduler loop.

use chrono::{FixedOffset, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::Instrument;

use secreport_core::{Result, ScheduleRecord, SecReportError};
use secreport_mail::{Attachment, DeliveryService, compose_from_file};
use secreport_render::DocumentRenderer;

use crate::fields::template_fields;
use crate::history::{RunHistory, RunRecord, RunState, Trigger};

/// Owns a rendered file; deletes it on `release` or on drop.
pub struct ArtifactGuard {
    path: Option<PathBuf>,
}

impl ArtifactGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Delete now. Returns false if the file could not be removed.
    pub fn release(mut self) -> bool {
        self.path.take().map(|p| remove_artifact(&p)).unwrap_or(true)
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            remove_artifact(&path);
        }
    }
}

fn remove_artifact(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "artifact removed");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove artifact");
            false
        }
    }
}

/// Holds a schedule's in-flight slot until dropped.
pub struct InFlightGuard {
    schedule_id: String,
    slots: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(&self.schedule_id);
        }
    }
}

pub struct ReportOrchestrator {
    renderer: Arc<DocumentRenderer>,
    delivery: Arc<DeliveryService>,
    template_path: PathBuf,
    tz: FixedOffset,
    in_flight: Arc<Mutex<HashSet<String>>>,
    history: RunHistory,
}

impl ReportOrchestrator {
    pub fn new(
        renderer: Arc<DocumentRenderer>,
        delivery: Arc<DeliveryService>,
        template_path: PathBuf,
        tz: FixedOffset,
    ) -> Self {
        Self {
            renderer,
            delivery,
            template_path,
            tz,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            history: RunHistory::default(),
        }
    }

    /// Claim the in-flight slot for `schedule_id`.
    pub fn try_begin(&self, schedule_id: &str) -> Result<InFlightGuard> {
        let mut slots = self
            .in_flight
            .lock()
            .map_err(|e| SecReportError::Scheduler(format!("in-flight lock: {e}")))?;
        if !slots.insert(schedule_id.to_string()) {
            return Err(SecReportError::RunAlreadyInProgress(schedule_id.to_string()));
        }
        Ok(InFlightGuard {
            schedule_id: schedule_id.to_string(),
            slots: self.in_flight.clone(),
        })
    }

    pub fn is_running(&self, schedule_id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|s| s.contains(schedule_id))
            .unwrap_or(false)
    }

    /// Claim the slot and run to completion. Only the claim can fail;
    /// stage failures are reported in the returned record.
    pub async fn run(&self, record: &ScheduleRecord, trigger: Trigger) -> Result<RunRecord> {
        let guard = self.try_begin(&record.id)?;
        Ok(self.execute(record, trigger, guard).await)
    }

    /// Run with an already claimed slot.
    pub async fn execute(
        &self,
        record: &ScheduleRecord,
        trigger: Trigger,
        slot: InFlightGuard,
    ) -> RunRecord {
        let span = tracing::info_span!("report_run", schedule_id = %record.id, tenant = %record.client);
        let run = self.pipeline(record, trigger).instrument(span).await;
        // Free the slot before the run becomes visible in history.
        drop(slot);
        self.history.record(run.clone());
        run
    }

    pub fn history(&self) -> Vec<RunRecord> {
        self.history.list()
    }

    async fn pipeline(&self, record: &ScheduleRecord, trigger: Trigger) -> RunRecord {
        let mut run = RunRecord::start(record, trigger);
        tracing::info!(trigger = ?trigger, "Executing scheduled report");

        run.transition(RunState::Rendering);
        let artifact = match self.renderer.render_tenant(&record.client, &[]).await {
            Ok(path) => ArtifactGuard::new(path),
            Err(e) => {
                tracing::error!(error = %e, "❌ Render failed, run aborted");
                run.fail(&e);
                run.finish(RunState::ErrorCleanup);
                return run;
            }
        };

        run.transition(RunState::Composing);
        let fields = template_fields(&record.client, Utc::now().with_timezone(&self.tz));
        let composed = compose_from_file(&self.template_path, &fields);
        let attachment_name = fields
            .get("nome_relatorio")
            .cloned()
            .unwrap_or_else(|| format!("Relatorio_vRx_{}.pdf", record.client));

        run.transition(RunState::Delivering);
        let delivered = match Attachment::from_path(artifact.path(), attachment_name).await {
            Ok(pdf) => {
                self.delivery
                    .send(&record.recipients, &composed.subject, &composed.body, vec![pdf])
                    .await
            }
            Err(e) => Err(e),
        };

        run.transition(RunState::CleaningUp);
        if !artifact.release() {
            tracing::warn!("⚠️ Artifact left on disk, run result unaffected");
        }

        match delivered {
            Ok(()) => tracing::info!("✅ Report delivered"),
            Err(e) => {
                tracing::error!(error = %e, "❌ Report delivery failed");
                run.fail(&e);
            }
        }
        run.finish(RunState::Done);
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineBehavior, Harness};
    use std::time::Duration;

    #[tokio::test]
    async fn test_happy_path_delivers_and_cleans_up() {
        let h = Harness::new(EngineBehavior::Pdf);
        let run = h
            .orchestrator
            .run(&h.record("1", "ACME"), Trigger::Cron)
            .await
            .unwrap();

        assert!(run.succeeded(), "{run:?}");
        assert_eq!(run.state, RunState::Done);
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["soc@acme.com", "ciso@acme.com"]);
        assert!(sent[0].subject.starts_with("Relatório mensal - "));
        assert!(sent[0].subject.contains(" de 20"));
        assert!(sent[0].html.contains("Formato: PDF"));
        let pdf = sent[0]
            .attachments
            .iter()
            .find(|a| a.content_type == "application/pdf")
            .unwrap();
        assert!(pdf.filename.starts_with("Relatorio_vRx_ACME_"));
        assert_eq!(pdf.bytes, b"%PDF-1.7 fake");
        assert!(h.downloads().is_empty());
        assert!(!h.orchestrator.is_running("1"));
    }

    #[tokio::test]
    async fn test_render_failure_goes_to_error_cleanup() {
        let h = Harness::new(EngineBehavior::Fail("navigation: timed out after 90s"));
        let run = h
            .orchestrator
            .run(&h.record("1", "ACME"), Trigger::Cron)
            .await
            .unwrap();

        assert_eq!(run.state, RunState::ErrorCleanup);
        assert_eq!(run.error_kind.as_deref(), Some("render"));
        assert!(h.mailer.sent().is_empty());
        assert!(h.downloads().is_empty());
        assert_eq!(h.orchestrator.history().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_still_deletes_artifact() {
        let h = Harness::with_rejecting_mailer(EngineBehavior::Pdf, "535 authentication failed");
        let run = h
            .orchestrator
            .run(&h.record("1", "ACME"), Trigger::Manual)
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Done);
        assert_eq!(run.error_kind.as_deref(), Some("delivery"));
        assert!(run.error.unwrap().contains("535"));
        assert!(h.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_second_run_for_same_schedule_rejected() {
        let h = Harness::new(EngineBehavior::Slow(Duration::from_millis(300)));
        let orchestrator = h.orchestrator.clone();
        let record = h.record("1", "ACME");
        let first = tokio::spawn({
            let record = record.clone();
            async move { orchestrator.run(&record, Trigger::Manual).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = h.orchestrator.run(&record, Trigger::Manual).await.unwrap_err();
        assert_eq!(err.kind(), "in_progress");
        assert!(err.to_string().contains("already in progress"));

        // a different schedule is not blocked
        assert!(h.orchestrator.try_begin("2").is_ok());

        assert!(first.await.unwrap().unwrap().succeeded());
        assert!(h.orchestrator.try_begin("1").is_ok());
    }

    #[tokio::test]
    async fn test_overrun_capture_keeps_slot_until_engine_exits() {
        let h = Harness::with_grace(
            EngineBehavior::Slow(Duration::from_millis(500)),
            Duration::from_millis(50),
        );
        let record = h.record("1", "ACME");
        let first = tokio::spawn({
            let orchestrator = h.orchestrator.clone();
            let record = record.clone();
            async move { orchestrator.run(&record, Trigger::Cron).await }
        });

        // Past the outer budget, engine still capturing.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.engine.live(), 1);
        let err = h.orchestrator.run(&record, Trigger::Cron).await.unwrap_err();
        assert_eq!(err.kind(), "in_progress");

        let run = first.await.unwrap().unwrap();
        assert_eq!(run.state, RunState::ErrorCleanup);
        assert!(run.error.unwrap().contains("did not finish"));
        assert_eq!(h.engine.live(), 0);

        let again = h.orchestrator.run(&record, Trigger::Cron).await.unwrap();
        assert_eq!(again.state, RunState::ErrorCleanup);
        assert_eq!(h.engine.peak(), 1);
        assert!(h.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_failure_does_not_change_outcome() {
        let h = Harness::new(EngineBehavior::Pdf);
        let downloads = h.downloads_dir();
        // Swap the rendered file for a non-empty directory so removal fails.
        h.mailer.on_send(move || {
            for entry in std::fs::read_dir(&downloads).unwrap() {
                let path = entry.unwrap().path();
                std::fs::remove_file(&path).unwrap();
                std::fs::create_dir(&path).unwrap();
                std::fs::write(path.join("keep"), b"x").unwrap();
            }
        });

        let run = h
            .orchestrator
            .run(&h.record("1", "ACME"), Trigger::Manual)
            .await
            .unwrap();
        assert_eq!(run.state, RunState::Done);
        assert_eq!(run.error, None);
        assert!(run.succeeded());
        assert_eq!(h.mailer.sent().len(), 1);
        assert_eq!(h.downloads().len(), 1);
        assert!(h.downloads()[0].is_dir());
        assert!(!h.orchestrator.is_running("1"));
    }

    #[test]
    fn test_artifact_guard_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relatorio_1.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        {
            let _guard = ArtifactGuard::new(path.clone());
        }
        assert!(!path.exists());
        let missing = ArtifactGuard::new(dir.path().join("gone.pdf"));
        assert!(missing.release());
    }
}
