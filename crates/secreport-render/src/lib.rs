//! # SecReport Render
//!
//! Materialises dashboard pages into a paginated PDF (A4 landscape,
//! background graphics on) using one headless Chromium process per call.
//!
//! The browser side is behind [`RenderEngine`], a blocking capture that
//! returns PDF bytes. [`DocumentRenderer`] owns file naming, the downloads
//! directory and the hard outer timeout.

pub mod engine;
pub mod renderer;

pub use engine::{CaptureRequest, ChromeEngine, RenderEngine};
pub use renderer::DocumentRenderer;
