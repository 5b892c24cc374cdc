//! Error types shared across the SecReport workspace.

use thiserror::Error;

/// Top-level error for every pipeline stage.
#[derive(Debug, Error)]
pub enum SecReportError {
    /// Pool establishment failed. The router has already evicted the key,
    /// so the next call retries.
    #[error("Connection error [{key}]: {message}")]
    Connection { key: String, message: String },

    /// Navigation/readiness timeout or engine failure. No artifact exists.
    #[error("Render error for {url}: {cause}")]
    Render { url: String, cause: String },

    /// Transport rejected the message.
    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Schedule not found or no enabled schedule available: {0}")]
    ScheduleNotFound(String),

    #[error("Run already in progress for schedule {0}")]
    RunAlreadyInProgress(String),

    /// Configuration store read/write failure.
    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SecReportError {
    pub fn connection(key: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Connection {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn render(url: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Render {
            url: url.into(),
            cause: cause.to_string(),
        }
    }

    /// Stable short code, used in run history and HTTP payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Render { .. } => "render",
            Self::Delivery(_) => "delivery",
            Self::Config(_) => "config",
            Self::Scheduler(_) => "scheduler",
            Self::InvalidSchedule(_) => "invalid_schedule",
            Self::ScheduleNotFound(_) => "not_found",
            Self::RunAlreadyInProgress(_) => "in_progress",
            Self::Store(_) => "store",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, SecReportError>;
