//! Connection pool keys.

use std::fmt;

/// Identifies one connection pool: a tenant database or the reserved
/// configuration database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TenantKey {
    Config,
    Tenant(String),
}

impl TenantKey {
    pub fn tenant(name: impl Into<String>) -> Self {
        Self::Tenant(name.into())
    }

    /// Database name this key resolves to.
    pub fn database<'a>(&'a self, config_database: &'a str) -> &'a str {
        match self {
            Self::Config => config_database,
            Self::Tenant(name) => name,
        }
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Tenant(name) => write!(f, "tenant:{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_database() {
        let acme = TenantKey::tenant("ACME");
        assert_eq!(acme.to_string(), "tenant:ACME");
        assert_eq!(acme.database("config_cybersecup"), "ACME");
        assert_eq!(TenantKey::Config.database("config_cybersecup"), "config_cybersecup");
    }

    #[test]
    fn test_config_key_distinct_from_tenant_named_config() {
        assert_ne!(TenantKey::Config, TenantKey::tenant("config"));
    }
}
