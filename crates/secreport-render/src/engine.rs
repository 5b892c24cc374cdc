//! Rendering engine seam and the headless Chromium implementation.

use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use std::path::PathBuf;
use std::time::Duration;

/// A4 portrait in inches; `landscape` rotates it.
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;

/// Everything one capture needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub url: String,
    /// Client state written to `localStorage` at `origin` before navigating to `url`.
    pub local_storage: Vec<(String, String)>,
    pub origin: Option<String>,
    pub viewport: (u32, u32),
    pub navigation_timeout: Duration,
    pub ready_selector: Option<String>,
    pub ready_timeout: Duration,
    /// Delay after the readiness marker so charts finish animating.
    pub settle: Duration,
}

impl CaptureRequest {
    /// Navigations the capture performs: the origin visit that seeds
    /// client state, then the target itself.
    pub fn navigations(&self) -> u32 {
        if self.local_storage.is_empty() { 1 } else { 2 }
    }

    /// Worst case for the engine-side waits.
    pub fn budget(&self) -> Duration {
        let ready = if self.ready_selector.is_some() {
            self.ready_timeout
        } else {
            Duration::ZERO
        };
        self.navigation_timeout * self.navigations() + ready + self.settle
    }
}

/// Blocking capture. Implementations launch their own engine instance and
/// must have torn it down by the time they return, on success or failure.
pub trait RenderEngine: Send + Sync + 'static {
    fn capture(&self, request: &CaptureRequest) -> std::result::Result<Vec<u8>, String>;
}

/// Headless Chromium over CDP.
pub struct ChromeEngine {
    chrome_path: Option<PathBuf>,
}

impl ChromeEngine {
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self { chrome_path }
    }
}

impl RenderEngine for ChromeEngine {
    fn capture(&self, req: &CaptureRequest) -> std::result::Result<Vec<u8>, String> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some(req.viewport))
            .path(self.chrome_path.clone())
            .idle_browser_timeout(req.budget() + Duration::from_secs(30))
            .build()
            .map_err(|e| format!("launch options: {e}"))?;

        // Dropping `browser` at the end of this scope kills the process.
        let browser = Browser::new(options).map_err(|e| format!("launch: {e}"))?;
        let tab = browser.new_tab().map_err(|e| format!("new tab: {e}"))?;
        tab.set_default_timeout(req.navigation_timeout);

        if !req.local_storage.is_empty() {
            let origin = req.origin.as_deref().unwrap_or(&req.url);
            tab.navigate_to(origin)
                .and_then(|t| t.wait_until_navigated())
                .map_err(|e| format!("navigation to {origin}: {e}"))?;
            tab.evaluate(&seed_script(&req.local_storage), false)
                .map_err(|e| format!("seeding client state: {e}"))?;
        }

        tab.navigate_to(&req.url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| format!("navigation: {e}"))?;

        if let Some(selector) = &req.ready_selector {
            tab.wait_for_element_with_custom_timeout(selector, req.ready_timeout)
                .map_err(|e| format!("readiness marker '{selector}': {e}"))?;
        }
        if !req.settle.is_zero() {
            std::thread::sleep(req.settle);
        }

        tab.print_to_pdf(Some(PrintToPdfOptions {
            landscape: Some(true),
            print_background: Some(true),
            paper_width: Some(A4_WIDTH_IN),
            paper_height: Some(A4_HEIGHT_IN),
            ..Default::default()
        }))
        .map_err(|e| format!("print: {e}"))
    }
}

/// JavaScript that writes each pair into `localStorage`.
pub fn seed_script(entries: &[(String, String)]) -> String {
    entries
        .iter()
        .map(|(k, v)| {
            format!(
                "localStorage.setItem({}, {});",
                serde_json::Value::from(k.as_str()),
                serde_json::Value::from(v.as_str())
            )
        })
        .collect::<Vec<_>>()
        .join("")
}
