//! Production connector: sqlx Postgres pools.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use secreport_core::TenantKey;
use secreport_core::config::DatabaseConfig;

use crate::router::Connector;

pub struct PgConnector {
    config: DatabaseConfig,
}

impl PgConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    /// An unnamed tenant resolves to `default_database`. The name is
    /// percent-encoded as a path segment.
    fn url_for(&self, key: &TenantKey) -> String {
        let database = match key {
            TenantKey::Tenant(name) if name.trim().is_empty() => self.config.default_database.as_str(),
            _ => key.database(&self.config.config_database),
        };
        self.config.url_for(&urlencoding::encode(database))
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Pool = PgPool;

    async fn connect(&self, key: &TenantKey) -> std::result::Result<PgPool, String> {
        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .connect(&self.url_for(key))
            .await
            .map_err(|e| e.to_string())?;
        tracing::info!(key = %key, "🔌 Connection pool ready");
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_uses_config_database_for_reserved_key() {
        let connector = PgConnector::new(DatabaseConfig {
            url_template: "postgres://u:p@db:5432/{database}".into(),
            config_database: "cfg".into(),
            ..Default::default()
        });
        assert_eq!(connector.url_for(&TenantKey::Config), "postgres://u:p@db:5432/cfg");
        assert_eq!(
            connector.url_for(&TenantKey::tenant("ACME")),
            "postgres://u:p@db:5432/ACME"
        );
    }

    #[test]
    fn test_unnamed_tenant_uses_default_database() {
        let connector = PgConnector::new(DatabaseConfig {
            url_template: "postgres://u:p@db:5432/{database}".into(),
            ..Default::default()
        });
        assert_eq!(
            connector.url_for(&TenantKey::tenant("")),
            "postgres://u:p@db:5432/GUIDONI"
        );
    }

    #[test]
    fn test_tenant_name_is_percent_encoded() {
        let connector = PgConnector::new(DatabaseConfig {
            url_template: "postgres://u:p@db:5432/{database}".into(),
            ..Default::default()
        });
        assert_eq!(
            connector.url_for(&TenantKey::tenant("ACME Corp")),
            "postgres://u:p@db:5432/ACME%20Corp"
        );
        assert_eq!(
            connector.url_for(&TenantKey::tenant("a/b?c")),
            "postgres://u:p@db:5432/a%2Fb%3Fc"
        );
    }
}
