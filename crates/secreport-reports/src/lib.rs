//! # SecReport Reports
//!
//! The report pipeline proper: the orchestrator state machine with its
//! cleanup and per-schedule in-flight guards, the run history, template
//! fields, and the schedule service that keeps scheduler jobs and the
//! persisted schedule set in step.

pub mod fields;
pub mod history;
pub mod orchestrator;
pub mod service;

#[cfg(test)]
mod testing;

pub use history::{RunRecord, RunState, Trigger};
pub use orchestrator::{ArtifactGuard, ReportOrchestrator};
pub use service::ScheduleService;
