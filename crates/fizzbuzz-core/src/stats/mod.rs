//! Request-frequency statistics
//!
//! [`FrequencyIndex`] counts observed queries and ranks them;
//! [`StatsReporter`] feeds it from the request path without blocking.

mod index;
mod reporter;

pub use index::{FrequencyEntry, FrequencyIndex, Ranking};
pub use reporter::{StatsReporter, DEFAULT_REPORT_TIMEOUT};
