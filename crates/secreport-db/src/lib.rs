//! # SecReport DB
//!
//! Tenant-aware connection pooling and the configuration store adapters.
//!
//! - [`ConnectionRouter`]: one lazily established pool per [`TenantKey`],
//!   concurrent first callers share the same connect attempt.
//! - [`PgConnector`]: production connector building `sqlx` Postgres pools.
//! - [`SqliteConfigStore`] / [`PgConfigStore`]: `dashboard_configs` key/value table.
//!
//! [`TenantKey`]: secreport_core::TenantKey

pub mod connector;
pub mod router;
pub mod store;

pub use connector::PgConnector;
pub use router::{ConnectionRouter, Connector};
pub use store::{PgConfigStore, SqliteConfigStore};
