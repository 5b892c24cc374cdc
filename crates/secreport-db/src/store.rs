//! `dashboard_configs` key/value table behind the [`ConfigStore`] trait.

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use sqlx::Row;
use std::path::Path;
use std::sync::{Arc, Mutex};

use secreport_core::{ConfigStore, Result, SecReportError, TenantKey};

use crate::connector::PgConnector;
use crate::router::ConnectionRouter;

/// Single-node store backed by SQLite.
pub struct SqliteConfigStore {
    conn: Mutex<Connection>,
}

impl SqliteConfigStore {
    /// Open or create the store database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| SecReportError::Store(format!("open {}: {e}", path.display())))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| SecReportError::Store(e.to_string()))?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS dashboard_configs (
                config_key TEXT PRIMARY KEY,
                config_value TEXT NOT NULL,
                updated_at TEXT DEFAULT (datetime('now'))
            );",
        )
        .map_err(|e| SecReportError::Store(format!("migrate: {e}")))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SecReportError::Store(format!("Lock: {e}")))
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT config_value FROM dashboard_configs WHERE config_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| SecReportError::Store(e.to_string()))?
        };
        raw.map(|s| serde_json::from_str(&s).map_err(SecReportError::from))
            .transpose()
    }

    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO dashboard_configs (config_key, config_value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(config_key) DO UPDATE SET
                config_value = excluded.config_value,
                updated_at = excluded.updated_at",
            params![key, raw],
        )
        .map_err(|e| SecReportError::Store(e.to_string()))?;
        Ok(())
    }
}

/// Store in the shared configuration database, reached through the router's
/// reserved [`TenantKey::Config`] pool.
pub struct PgConfigStore {
    router: Arc<ConnectionRouter<PgConnector>>,
}

impl PgConfigStore {
    pub fn new(router: Arc<ConnectionRouter<PgConnector>>) -> Self {
        Self { router }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let pool = self.router.get_pool(&TenantKey::Config).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS dashboard_configs (
                config_key TEXT PRIMARY KEY,
                config_value TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| SecReportError::Store(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let pool = self.router.get_pool(&TenantKey::Config).await?;
        let row = sqlx::query("SELECT config_value FROM dashboard_configs WHERE config_key = $1")
            .bind(key)
            .fetch_optional(&pool)
            .await
            .map_err(|e| SecReportError::Store(e.to_string()))?;
        match row {
            Some(row) => {
                let raw: String = row
                    .try_get("config_value")
                    .map_err(|e| SecReportError::Store(e.to_string()))?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        let pool = self.router.get_pool(&TenantKey::Config).await?;
        sqlx::query(
            "INSERT INTO dashboard_configs (config_key, config_value, updated_at)
             VALUES ($1, $2, now())
             ON CONFLICT (config_key) DO UPDATE SET
                config_value = EXCLUDED.config_value,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .execute(&pool)
        .await
        .map_err(|e| SecReportError::Store(e.to_string()))?;
        Ok(())
    }
}
