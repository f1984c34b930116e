//! Component D — Connection/Context Registry.

mod backend;
mod context;

pub use backend::{
    bind_mysql_params, bind_pg_params, decode_mysql_row, decode_pg_row, introspect_schema,
    DecodedColumn,
};
pub use context::Context;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::config_store::ConfigStore;
use crate::error::AppError;
use crate::model::DatabaseDescriptor;

pub struct ConnectionRegistry {
    cache: Cache<String, Arc<Context>>,
    config_store: Arc<dyn ConfigStore>,
    pool_size: u32,
}

impl ConnectionRegistry {
    pub fn new(
        capacity: u64,
        idle_secs: u64,
        pool_size: u32,
        config_store: Arc<dyn ConfigStore>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(Duration::from_secs(idle_secs))
            .build();
        Self {
            cache,
            config_store,
            pool_size,
        }
    }

    /// Installs one context per stored descriptor. Failures are logged and
    /// do not abort startup (§4.4 "Startup preload").
    pub async fn preload(&self) {
        let descriptors = match self.config_store.list_all().await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list descriptors during registry preload");
                return;
            }
        };
        for descriptor in descriptors {
            match Context::open(&descriptor, self.pool_size).await {
                Ok(ctx) => {
                    self.cache.insert(descriptor.cache_key(), Arc::new(ctx)).await;
                    tracing::info!(descriptor = %descriptor.cache_key(), "preloaded connection context");
                }
                Err(e) => {
                    tracing::warn!(descriptor = %descriptor.cache_key(), error = %e, "failed to preload connection context");
                }
            }
        }
    }

    /// Returns the cached context for `descriptor`, opening one on miss.
    pub async fn get_or_create(&self, descriptor: &DatabaseDescriptor) -> Result<Arc<Context>, AppError> {
        let key = descriptor.cache_key();
        let pool_size = self.pool_size;
        let descriptor = descriptor.clone();
        self.cache
            .try_get_with(key, async move {
                Context::open(&descriptor, pool_size).await.map(Arc::new)
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Verifies a descriptor is reachable via a disposable connection,
    /// independent of the cached context (§4.4 "Mutation hooks").
    pub async fn verify_descriptor(&self, descriptor: &DatabaseDescriptor) -> Result<(), AppError> {
        Context::verify(descriptor).await
    }

    /// Evicts the cached context for `descriptor_key`, forcing the next
    /// request to open a fresh one (used by `update_descriptor` /
    /// `delete_descriptor`).
    pub async fn invalidate(&self, descriptor_key: &str) {
        self.cache.invalidate(descriptor_key).await;
    }
}
