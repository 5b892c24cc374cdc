//! # SecReport Core
//!
//! Shared types for the scheduled report pipeline: errors, configuration,
//! schedule records, tenant keys, transport settings and the configuration
//! store seam.
//!
//! ## Pipeline
//! ```text
//! ScheduleService ── JobScheduler (cron) ──┐
//!        │                                  ▼
//!        └──── manual trigger ──────▶ ReportOrchestrator
//!                                     ├── DocumentRenderer (headless Chromium → PDF)
//!                                     ├── compose (email.html + fields)
//!                                     ├── DeliveryService (SMTP)
//!                                     └── ArtifactGuard (cleanup)
//! ```

pub mod config;
pub mod error;
pub mod schedule;
pub mod store;
pub mod tenant;
pub mod transport;

pub use config::SecReportConfig;
pub use error::{Result, SecReportError};
pub use schedule::{Frequency, ScheduleRecord, TimeOfDay, SCHEDULE_CONFIGS_KEY};
pub use store::{ConfigStore, MemoryConfigStore};
pub use tenant::TenantKey;
pub use transport::{TransportConfig, SMTP_CONFIG_KEY};
