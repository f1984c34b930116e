//! Component H — Config Store.
//!
//! Persists [`DatabaseDescriptor`]s. The core only ever calls
//! [`ConfigStore::get_by_id`] and [`ConfigStore::list_all`]; the remaining
//! mutating methods back the `/api/configs` HTTP routes.

mod sqlite;

pub use sqlite::SqliteConfigStore;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::model::DatabaseDescriptor;

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<DatabaseDescriptor>>;
    async fn list_all(&self) -> AppResult<Vec<DatabaseDescriptor>>;
    async fn insert(&self, descriptor: DatabaseDescriptor) -> AppResult<DatabaseDescriptor>;
    async fn update(
        &self,
        id: &str,
        descriptor: DatabaseDescriptor,
    ) -> AppResult<Option<DatabaseDescriptor>>;
    async fn delete(&self, id: &str) -> AppResult<bool>;
}
