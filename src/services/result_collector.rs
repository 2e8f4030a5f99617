//! Waits for a fleet to publish its results and dumps them to a CSV artifact.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{CollectError, StoreResult};
use crate::domain::models::{PortBlock, ResultRecord};
use crate::services::result_store_gateway::ResultStoreGateway;
use crate::services::worker_pool::WorkerPool;

/// Outcome of a bounded wait on the result count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready { observed: usize },
    TimedOut { observed: usize },
}

/// Outcome of [`ResultCollector::await_and_collect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Every node reported and the artifact was written.
    Collected { records: Vec<ResultRecord> },
    /// The timeout elapsed first; nothing was written.
    TimedOut { observed: usize, expected: usize },
}

impl CollectOutcome {
    pub const fn is_collected(&self) -> bool {
        matches!(self, Self::Collected { .. })
    }
}

pub struct ResultCollector {
    gateway: ResultStoreGateway,
    pool: WorkerPool,
}

impl ResultCollector {
    pub fn new(gateway: ResultStoreGateway, pool: WorkerPool) -> Self {
        Self { gateway, pool }
    }

    pub const fn gateway(&self) -> &ResultStoreGateway {
        &self.gateway
    }

    /// Poll `count()` every `poll` until it reaches `expected` or `timeout` elapses.
    ///
    /// The count is checked once more at the deadline, so a fleet that
    /// finishes during the last sleep still counts. A timeout too large to
    /// represent as an instant means no deadline.
    pub async fn wait_for(
        &self,
        expected: usize,
        poll: Duration,
        timeout: Duration,
    ) -> StoreResult<WaitOutcome> {
        let deadline = Instant::now().checked_add(timeout);
        let mut polls = 0u64;

        loop {
            let observed = self.gateway.count().await?;
            polls += 1;
            if observed >= expected {
                debug!(observed, expected, polls, "Result count satisfied");
                return Ok(WaitOutcome::Ready { observed });
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(WaitOutcome::TimedOut { observed });
                    }
                    poll.min(deadline - now)
                }
                None => poll,
            };
            debug!(observed, expected, "Waiting for results");
            tokio::time::sleep(pause).await;
        }
    }

    /// Fetch every key in `block` and write `key,value` lines to `path`.
    ///
    /// Absent values become an empty field. The file appears under its
    /// final name only once fully written.
    pub async fn dump(
        &self,
        block: PortBlock,
        path: &Path,
    ) -> Result<Vec<ResultRecord>, CollectError> {
        let records = self.gateway.get_all(block, &self.pool).await?;
        let bytes = render_csv(&records).map_err(|source| CollectError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, &bytes)
            .await
            .map_err(|source| CollectError::Artifact {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(records)
    }

    /// Wait for `block.len()` results, then dump them to `path`.
    ///
    /// On timeout nothing is written.
    #[instrument(skip(self, block, path), fields(expected = block.len(), path = %path.display()))]
    pub async fn await_and_collect(
        &self,
        block: PortBlock,
        path: &Path,
        poll: Duration,
        timeout: Duration,
    ) -> Result<CollectOutcome, CollectError> {
        let expected = block.len();
        match self.wait_for(expected, poll, timeout).await? {
            WaitOutcome::Ready { .. } => {
                let records = self.dump(block, path).await?;
                info!(lines = records.len(), "Results written");
                Ok(CollectOutcome::Collected { records })
            }
            WaitOutcome::TimedOut { observed } => {
                warn!(observed, expected, ?timeout, "Timed out waiting for results");
                Ok(CollectOutcome::TimedOut { observed, expected })
            }
        }
    }
}

/// One `key,value` line per record, no header, values written unquoted.
fn render_csv(records: &[ResultRecord]) -> io::Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for record in records {
        writer.write_record([record.key.as_str(), record.value.as_deref().unwrap_or("")])?;
    }
    writer.into_inner().map_err(csv::IntoInnerError::into_error)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = partial_path(path);
    tokio::fs::write(&partial, bytes).await?;
    tokio::fs::rename(&partial, path).await
}
