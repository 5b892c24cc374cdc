//! Connection Router: one pool per tenant key, established on first use.
//!
//! The cache holds the in-flight establishment as a shared future, so a burst
//! of first requests for one tenant produces exactly one connect attempt.
//! A failed attempt is evicted and reported to every waiter; the next call
//! starts over.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use secreport_core::{Result, SecReportError, TenantKey};

/// Establishes a pool for a key. Errors are plain driver messages so the
/// shared future output stays `Clone`.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Pool: Clone + Send + Sync + 'static;

    async fn connect(&self, key: &TenantKey) -> std::result::Result<Self::Pool, String>;
}

type PendingPool<P> = Shared<BoxFuture<'static, std::result::Result<P, String>>>;

pub struct ConnectionRouter<C: Connector> {
    connector: Arc<C>,
    pools: Mutex<HashMap<TenantKey, PendingPool<C::Pool>>>,
}

impl<C: Connector> ConnectionRouter<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Ready pool for `key`, connecting on first use.
    pub async fn get_pool(&self, key: &TenantKey) -> Result<C::Pool> {
        let pending = {
            let mut pools = self.lock()?;
            pools
                .entry(key.clone())
                .or_insert_with(|| {
                    tracing::debug!(key = %key, "establishing connection pool");
                    let connector = self.connector.clone();
                    let key = key.clone();
                    async move { connector.connect(&key).await }.boxed().shared()
                })
                .clone()
        };

        match pending.clone().await {
            Ok(pool) => Ok(pool),
            Err(message) => {
                // Only evict the attempt we awaited; a retry may already be cached.
                let mut pools = self.lock()?;
                if pools.get(key).is_some_and(|cur| cur.ptr_eq(&pending)) {
                    pools.remove(key);
                    tracing::warn!(key = %key, error = %message, "connection failed, pool evicted");
                }
                Err(SecReportError::connection(key, message))
            }
        }
    }

    /// Keys with a cached (ready or pending) pool.
    pub fn cached_keys(&self) -> Vec<TenantKey> {
        self.pools
            .lock()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<TenantKey, PendingPool<C::Pool>>>> {
        self.pools
            .lock()
            .map_err(|e| SecReportError::Store(format!("pool cache lock: {e}")))
    }
}
