//! # SecReport Gateway
//!
//! Administrative HTTP API (Axum): schedule management, manual triggers,
//! run history, test e-mail and on-demand PDF export.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start_server};
