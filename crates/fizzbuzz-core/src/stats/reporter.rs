//! Background statistics reporter
//!
//! Moves frequency-index updates off the request path. Each submission runs
//! in its own task with its own timeout; it is not cancelled when the request
//! that produced it finishes or is dropped, and its failures are only logged.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use super::index::FrequencyIndex;
use crate::error::IndexError;
use crate::query::FizzBuzzQuery;

/// Default upper bound on one background update.
pub const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fire-and-forget submitter of observed queries.
#[derive(Clone)]
pub struct StatsReporter {
    index: Arc<FrequencyIndex>,
    timeout: Duration,
}

impl StatsReporter {
    /// Create a reporter feeding `index`, bounding each update by `timeout`.
    pub fn new(index: Arc<FrequencyIndex>, timeout: Duration) -> Self {
        Self { index, timeout }
    }

    /// Schedule one observation of `query` and return immediately.
    ///
    /// Outside a tokio runtime the observation is recorded inline.
    pub fn submit(&self, query: FizzBuzzQuery) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!(query_key = %query, "no runtime available, recording statistics inline");
                self.index.observe(query);
                return;
            }
        };

        let index = Arc::clone(&self.index);
        let timeout = self.timeout;
        handle.spawn(async move {
            let key = query.key();
            if let Err(e) = record(index, query, timeout).await {
                error!(error = %e, query_key = %key, "failed to update statistics");
            }
        });
    }
}

/// Run one observation on the blocking pool so that lock contention cannot
/// stall the async workers, giving up after `timeout`.
async fn record(
    index: Arc<FrequencyIndex>,
    query: FizzBuzzQuery,
    timeout: Duration,
) -> Result<(), IndexError> {
    let update = tokio::task::spawn_blocking(move || index.observe(query));

    match tokio::time::timeout(timeout, update).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(join_error)) => {
            // The write guard is released on unwind, so the index stays consistent.
            warn!(error = %join_error, "statistics update task failed");
            Ok(())
        }
        Err(_) => Err(IndexError::Timeout(timeout)),
    }
}
