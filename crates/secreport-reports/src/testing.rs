//! Fakes shared by the orchestrator and service tests.

use async_trait::async_trait;
use chrono::FixedOffset;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secreport_core::config::{MailConfig, RenderConfig};
use secreport_core::{
    ConfigStore, Frequency, MemoryConfigStore, Result, ScheduleRecord, SecReportError,
    TransportConfig,
};
use secreport_mail::{DeliveryService, Mailer, OutgoingMail};
use secreport_render::{CaptureRequest, DocumentRenderer, RenderEngine};

use crate::orchestrator::ReportOrchestrator;

pub enum EngineBehavior {
    Pdf,
    Fail(&'static str),
    Slow(Duration),
}

pub struct FakeEngine {
    behavior: EngineBehavior,
    live: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeEngine {
    /// Captures running right now.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Most captures ever running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl RenderEngine for FakeEngine {
    fn capture(&self, _request: &CaptureRequest) -> std::result::Result<Vec<u8>, String> {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let out = match &self.behavior {
            EngineBehavior::Pdf => Ok(b"%PDF-1.7 fake".to_vec()),
            EngineBehavior::Fail(msg) => Err(msg.to_string()),
            EngineBehavior::Slow(d) => {
                std::thread::sleep(*d);
                Ok(b"%PDF-1.7 fake".to_vec())
            }
        };
        self.live.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

type SendHook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    reject_with: Option<String>,
    on_send: Mutex<Option<SendHook>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    /// Run `hook` inside every later `send`, after the attachment was read.
    pub fn on_send(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_send.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, _transport: &TransportConfig, mail: &OutgoingMail) -> Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        if let Some(hook) = self.on_send.lock().unwrap().as_ref() {
            hook();
        }
        match &self.reject_with {
            Some(msg) => Err(SecReportError::Delivery(msg.clone())),
            None => Ok(()),
        }
    }
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub store: Arc<MemoryConfigStore>,
    pub mailer: Arc<RecordingMailer>,
    pub engine: Arc<FakeEngine>,
    pub orchestrator: Arc<ReportOrchestrator>,
}

impl Harness {
    pub fn new(behavior: EngineBehavior) -> Self {
        Self::build(behavior, RecordingMailer::default(), None)
    }

    /// Every engine-side wait set to zero, so the capture is bounded by
    /// `grace` alone.
    pub fn with_grace(behavior: EngineBehavior, grace: Duration) -> Self {
        Self::build(behavior, RecordingMailer::default(), Some(grace))
    }

    pub fn with_rejecting_mailer(behavior: EngineBehavior, message: &str) -> Self {
        Self::build(
            behavior,
            RecordingMailer {
                reject_with: Some(message.to_string()),
                ..Default::default()
            },
            None,
        )
    }

    fn build(behavior: EngineBehavior, mailer: RecordingMailer, grace: Option<Duration>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("email.html");
        std::fs::write(
            &template,
            "<html><head><title>Relatório mensal - {{ periodo_mes_anterior_str }}</title></head>\
             <body>Formato: {{formato_relatorio}} / {{nome_relatorio}} / {{ data_geracao }}</body></html>",
        )
        .unwrap();

        let mut render_cfg = RenderConfig {
            downloads_dir: dir.path().join("downloads").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let engine = Arc::new(FakeEngine {
            behavior,
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        if grace.is_some() {
            render_cfg.single_page_timeout_secs = 0;
            render_cfg.page_set_timeout_secs = 0;
            render_cfg.ready_timeout_secs = 0;
            render_cfg.settle_ms = 0;
        }
        let mut renderer = DocumentRenderer::new(render_cfg, engine.clone());
        if let Some(grace) = grace {
            renderer = renderer.with_grace(grace);
        }
        let renderer = Arc::new(renderer);

        let store = Arc::new(MemoryConfigStore::new());
        let mailer = Arc::new(mailer);
        let mail_cfg = MailConfig {
            assets_dir: dir.path().join("img").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let delivery = Arc::new(DeliveryService::new(
            store.clone() as Arc<dyn ConfigStore>,
            mailer.clone(),
            mail_cfg,
        ));
        let orchestrator = Arc::new(ReportOrchestrator::new(
            renderer,
            delivery,
            template,
            FixedOffset::west_opt(3 * 3600).unwrap(),
        ));

        Self {
            dir,
            store,
            mailer,
            engine,
            orchestrator,
        }
    }

    pub fn record(&self, id: &str, client: &str) -> ScheduleRecord {
        ScheduleRecord {
            id: id.into(),
            client: client.into(),
            frequency: Frequency::Daily,
            day: 1,
            time: "09:00".into(),
            recipients: "soc@acme.com, ciso@acme.com".into(),
            is_enabled: true,
        }
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    /// Files left in the downloads directory.
    pub fn downloads(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.downloads_dir())
            .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}
