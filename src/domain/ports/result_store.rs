//! Result store port.

use async_trait::async_trait;

use crate::domain::errors::StoreResult;

/// Key-value store nodes publish their results into.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Keys matching a glob-style `pattern` (e.g. `result:*`).
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Drop every key in the store.
    async fn flush_all(&self) -> StoreResult<()>;
}
