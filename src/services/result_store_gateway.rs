//! Thin view of the result store scoped to one key prefix.

use std::sync::Arc;

use tracing::debug;

use crate::domain::errors::StoreResult;
use crate::domain::models::{PortBlock, ResultRecord};
use crate::domain::ports::ResultStore;
use crate::services::worker_pool::WorkerPool;

/// Counts, reads and flushes `<prefix>:<port>` keys.
///
/// No retries: connectivity errors go straight back to the caller.
#[derive(Clone)]
pub struct ResultStoreGateway {
    store: Arc<dyn ResultStore>,
    key_prefix: String,
}

impl ResultStoreGateway {
    pub fn new(store: Arc<dyn ResultStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Number of result keys currently published.
    pub async fn count(&self) -> StoreResult<usize> {
        let pattern = format!("{}:*", self.key_prefix);
        Ok(self.store.keys(&pattern).await?.len())
    }

    pub async fn get(&self, port: u16) -> StoreResult<ResultRecord> {
        let key = ResultRecord::key_for(&self.key_prefix, port);
        let value = self.store.get(&key).await?;
        Ok(ResultRecord { port, key, value })
    }

    /// Look up every port in `block` through `pool`, in ascending port order.
    ///
    /// Absent keys come back with `value: None`; the first store error aborts.
    pub async fn get_all(
        &self,
        block: PortBlock,
        pool: &WorkerPool,
    ) -> StoreResult<Vec<ResultRecord>> {
        let records = pool
            .map_ordered(block.ports(), |port| self.get(port))
            .await
            .into_iter()
            .collect::<StoreResult<Vec<_>>>()?;

        debug!(
            requested = block.len(),
            present = records.iter().filter(|r| r.value.is_some()).count(),
            "Fetched result records"
        );
        Ok(records)
    }

    pub async fn flush_all(&self) -> StoreResult<()> {
        self.store.flush_all().await
    }
}
