//! # SecReport Scheduler
//!
//! Named cron jobs on tokio timers, evaluated in a fixed reporting timezone.
//!
//! ```text
//! JobScheduler
//!   ├── "report-1717000000000": "0 0 9 * * *"   → callback
//!   ├── "report-1717000000001": "0 30 8 * * 2"  → callback
//!   └── "report-1717000000002": "0 0 7 1 * *"   → callback
//! ```

pub mod cron;
pub mod engine;

pub use self::cron::{cron_expression, next_fire};
pub use engine::JobScheduler;
