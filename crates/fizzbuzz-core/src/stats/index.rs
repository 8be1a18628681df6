//! Request Frequency Index
//!
//! Counts how many times each distinct [`FizzBuzzQuery`] has been observed
//! and answers "which query is the most frequent?" on demand.
//!
//! A single `RwLock` guards the whole map: observations take the write side,
//! ranking takes the read side and scans every entry without releasing it,
//! so a ranking always reflects one consistent state of the index.

#![forbid(unsafe_code)]

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::IndexError;
use crate::query::FizzBuzzQuery;

/// Entries scanned between two cancellation checks during `rank`.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Statistics for one distinct query.
#[derive(Clone, Debug)]
pub struct FrequencyEntry {
    query: FizzBuzzQuery,
    hits: u64,
    first_seen: Instant,
    last_seen: Instant,
    /// Insertion order, used to break ties between equal counts.
    sequence: u64,
}

impl FrequencyEntry {
    /// The query this entry counts.
    pub fn query(&self) -> &FizzBuzzQuery {
        &self.query
    }

    /// Number of observations so far. Always at least 1.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Instant of the first observation.
    pub fn first_seen(&self) -> Instant {
        self.first_seen
    }

    /// Instant of the most recent observation.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Whether this entry outranks `other`: more hits, or equal hits and
    /// observed first.
    fn outranks(&self, other: &FrequencyEntry) -> bool {
        self.hits > other.hits || (self.hits == other.hits && self.sequence < other.sequence)
    }
}

/// The most frequent query at the time of a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ranking {
    /// `None` when nothing has been observed yet
    #[serde(rename = "most_frequent_request")]
    pub query: Option<FizzBuzzQuery>,
    /// Observations of `query`, 0 when the index is empty
    pub hits: u64,
}

impl Ranking {
    /// Ranking of an empty index.
    pub fn empty() -> Self {
        Self {
            query: None,
            hits: 0,
        }
    }
}

#[derive(Default)]
struct IndexState {
    entries: HashMap<FizzBuzzQuery, FrequencyEntry>,
    next_sequence: u64,
}

/// Concurrency-safe map from query to cumulative hit count.
#[derive(Default)]
pub struct FrequencyIndex {
    state: RwLock<IndexState>,
}

impl FrequencyIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `query`.
    pub fn observe(&self, query: FizzBuzzQuery) {
        let now = Instant::now();
        let mut guard = self.state.write();
        let state = &mut *guard;

        match state.entries.entry(query) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.hits += 1;
                entry.last_seen = now;
            }
            Entry::Vacant(vacant) => {
                let sequence = state.next_sequence;
                state.next_sequence += 1;
                let query = vacant.key().clone();
                vacant.insert(FrequencyEntry {
                    query,
                    hits: 1,
                    first_seen: now,
                    last_seen: now,
                    sequence,
                });
            }
        }
    }

    /// Return the most frequent query and its hit count.
    ///
    /// Ties go to the query observed first. Returns
    /// [`IndexError::Cancelled`] if `cancel` fires before the scan finishes.
    pub fn rank(&self, cancel: &CancellationToken) -> Result<Ranking, IndexError> {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let state = self.state.read();
        let best = find_most_frequent(state.entries.values(), cancel)?;

        Ok(match best {
            Some(entry) => Ranking {
                query: Some(entry.query.clone()),
                hits: entry.hits,
            },
            None => Ranking::empty(),
        })
    }

    /// Look up the entry for `query`.
    pub fn get(&self, query: &FizzBuzzQuery) -> Option<FrequencyEntry> {
        self.state.read().entries.get(query).cloned()
    }

    /// Hit counts keyed by [`FizzBuzzQuery::key`].
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.state
            .read()
            .entries
            .values()
            .map(|entry| (entry.query.key(), entry.hits))
            .collect()
    }

    /// All entries, in no particular order.
    pub fn entries(&self) -> Vec<FrequencyEntry> {
        self.state.read().entries.values().cloned().collect()
    }

    /// Sum of all hit counts.
    pub fn total_hits(&self) -> u64 {
        self.state.read().entries.values().map(|e| e.hits).sum()
    }

    /// Number of distinct queries tracked.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Whether nothing has been observed since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Hold the write lock until the returned guard is dropped.
    #[cfg(test)]
    pub(crate) fn lock_exclusive(&self) -> impl Sized + '_ {
        self.state.write()
    }

    /// Drop every entry. Intended for test fixtures.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.next_sequence = 0;
    }
}

/// Scan `entries` for the highest-ranked one, checking `cancel` every
/// [`CANCEL_CHECK_INTERVAL`] entries.
fn find_most_frequent<'a, I>(
    entries: I,
    cancel: &CancellationToken,
) -> Result<Option<&'a FrequencyEntry>, IndexError>
where
    I: IntoIterator<Item = &'a FrequencyEntry>,
{
    let mut best: Option<&FrequencyEntry> = None;

    for (scanned, entry) in entries.into_iter().enumerate() {
        if scanned % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        if best.map_or(true, |current| entry.outranks(current)) {
            best = Some(entry);
        }
    }

    Ok(best)
}
