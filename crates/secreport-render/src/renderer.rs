//! Document Renderer: runs one capture per call and writes the artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use secreport_core::config::RenderConfig;
use secreport_core::{Result, SecReportError};

use crate::engine::{CaptureRequest, RenderEngine};

/// Slack on top of the engine-side waits before a capture is declared wedged.
const OUTER_GRACE: Duration = Duration::from_secs(30);

pub struct DocumentRenderer {
    config: RenderConfig,
    engine: Arc<dyn RenderEngine>,
    grace: Duration,
}

impl DocumentRenderer {
    pub fn new(config: RenderConfig, engine: Arc<dyn RenderEngine>) -> Self {
        Self {
            config,
            engine,
            grace: OUTER_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn downloads_dir(&self) -> &Path {
        Path::new(&self.config.downloads_dir)
    }

    /// Render a single URL into `relatorio_<millis>_<suffix>.pdf`.
    pub async fn render_url(&self, url: &str) -> Result<PathBuf> {
        let request = CaptureRequest {
            url: url.to_string(),
            local_storage: Vec::new(),
            origin: None,
            viewport: self.viewport(),
            navigation_timeout: Duration::from_secs(self.config.single_page_timeout_secs),
            ready_selector: self.ready_selector(),
            ready_timeout: Duration::from_secs(self.config.ready_timeout_secs),
            settle: Duration::ZERO,
        };
        let filename = format!("relatorio_{}.pdf", unique_stamp());
        self.run(request, &filename).await
    }

    /// Tenant report: the tenant's default dashboard page when `page_ids`
    /// is empty, otherwise the listed pages.
    pub async fn render_tenant(&self, tenant: &str, page_ids: &[String]) -> Result<PathBuf> {
        if page_ids.is_empty() {
            let url = format!(
                "{}/?client={}",
                self.config.target_base_url.trim_end_matches('/'),
                urlencoding::encode(tenant)
            );
            self.render_url(&url).await
        } else {
            self.render_page_set(tenant, page_ids).await
        }
    }

    /// Render the tenant's page set (all pages when `page_ids` is empty)
    /// into one `Relatorio_vRx_<tenant>_<millis>_<suffix>.pdf`.
    pub async fn render_page_set(&self, tenant: &str, page_ids: &[String]) -> Result<PathBuf> {
        let request = self.page_set_request(tenant, page_ids);
        let filename = format!(
            "Relatorio_vRx_{}_{}.pdf",
            sanitize_filename(tenant),
            unique_stamp()
        );
        self.run(request, &filename).await
    }

    fn page_set_request(&self, tenant: &str, page_ids: &[String]) -> CaptureRequest {
        let base = self.config.target_base_url.trim_end_matches('/');
        let url = format!(
            "{base}/?client={}&exportAll=true&isPdfMode=true",
            urlencoding::encode(tenant)
        );
        let mut local_storage = vec![("selected_client".to_string(), tenant.to_string())];
        if !page_ids.is_empty() {
            local_storage.push((
                "export_pages".to_string(),
                serde_json::Value::from(page_ids.to_vec()).to_string(),
            ));
        }
        CaptureRequest {
            url,
            local_storage,
            origin: Some(format!("{base}/")),
            viewport: self.viewport(),
            navigation_timeout: Duration::from_secs(self.config.page_set_timeout_secs),
            ready_selector: self.ready_selector(),
            ready_timeout: Duration::from_secs(self.config.ready_timeout_secs),
            settle: Duration::from_millis(self.config.settle_ms),
        }
    }

    async fn run(&self, request: CaptureRequest, filename: &str) -> Result<PathBuf> {
        let url = request.url.clone();
        let dir = self.downloads_dir().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SecReportError::render(&url, format!("downloads dir {}: {e}", dir.display())))?;

        let outer = request.budget() + self.grace;
        let engine = self.engine.clone();
        tracing::info!(url = %url, "🖨️ Rendering document");

        let mut task = tokio::task::spawn_blocking(move || engine.capture(&request));
        let bytes = match tokio::time::timeout(outer, &mut task).await {
            Ok(Ok(Ok(bytes))) => bytes,
            Ok(Ok(Err(cause))) => return Err(SecReportError::render(&url, cause)),
            Ok(Err(join)) => return Err(SecReportError::render(&url, format!("engine task: {join}"))),
            Err(_) => {
                // A blocking task cannot be cancelled. Hold the caller until the
                // engine has torn its browser down so no second one starts.
                tracing::warn!(url = %url, budget_secs = outer.as_secs(), "⏳ Engine overran its budget, waiting for shutdown");
                let _ = task.await;
                return Err(SecReportError::render(
                    &url,
                    format!("engine did not finish within {}s", outer.as_secs_f32()),
                ));
            }
        };

        let path = dir.join(filename);
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %rm, "could not remove partial artifact");
                }
            }
            return Err(SecReportError::render(&url, format!("write {}: {e}", path.display())));
        }

        tracing::info!(path = %path.display(), bytes = bytes.len(), "✅ Document rendered");
        Ok(path)
    }

    fn viewport(&self) -> (u32, u32) {
        (self.config.viewport_width, self.config.viewport_height)
    }

    fn ready_selector(&self) -> Option<String> {
        Some(self.config.ready_selector.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
    }
}

/// `<millis>_<8 hex chars>`: timestamp plus a run-unique suffix.
fn unique_stamp() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", chrono::Utc::now().timestamp_millis(), &id[..8])
}

fn sanitize_filename(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
