//! FizzBuzz use cases
//!
//! Ties validation, generation and statistics together. The HTTP layer only
//! decodes requests and encodes responses around these two operations.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::generator;
use crate::query::FizzBuzzQuery;
use crate::stats::{FrequencyIndex, Ranking, StatsReporter};

/// Entry point for the two functional endpoints.
pub struct FizzBuzzService {
    index: Arc<FrequencyIndex>,
    reporter: StatsReporter,
    max_limit: u64,
}

impl FizzBuzzService {
    /// Compose a service around an existing index.
    pub fn new(index: Arc<FrequencyIndex>, reporter: StatsReporter, max_limit: u64) -> Self {
        Self {
            index,
            reporter,
            max_limit,
        }
    }

    /// Build the service and its statistics pipeline from configuration.
    pub fn from_config(config: &Config, index: Arc<FrequencyIndex>) -> Self {
        let reporter = StatsReporter::new(Arc::clone(&index), config.stats.report_timeout());
        Self::new(index, reporter, config.fizzbuzz.max_limit)
    }

    /// The statistics index.
    pub fn index(&self) -> &Arc<FrequencyIndex> {
        &self.index
    }

    /// Configured ceiling on `limit`.
    pub fn max_limit(&self) -> u64 {
        self.max_limit
    }

    /// Validate `query`, record it in the background and generate its sequence.
    ///
    /// Invalid queries are rejected with every failed condition and never
    /// reach the statistics.
    pub fn generate(&self, query: FizzBuzzQuery) -> Result<Vec<String>> {
        query.validate(self.max_limit)?;
        let result = generator::generate(&query);
        self.reporter.submit(query);
        Ok(result)
    }

    /// Most frequent query so far.
    ///
    /// The scan runs on the blocking pool and stops early once `cancel` fires.
    pub async fn statistics(&self, cancel: CancellationToken) -> Result<Ranking> {
        let index = Arc::clone(&self.index);
        let ranking = tokio::task::spawn_blocking(move || index.rank(&cancel))
            .await
            .map_err(|e| ServiceError::Internal(format!("statistics task failed: {}", e)))??;
        Ok(ranking)
    }
}
