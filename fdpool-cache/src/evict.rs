//! Eviction passes over a [`TrackedMap`].

use std::fmt::Debug;
use std::hash::Hash;

use crate::clock::Clock;
use crate::map::TrackedMap;
use crate::policy::{EvictionPolicy, PolicyError};
use crate::Closeable;

/// Outcome of a single eviction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionReport<K> {
    /// Number of entries in the map when the pass started.
    pub population: usize,
    /// Number of entries that satisfied the policy's condition.
    pub candidates: usize,
    /// Keys that were closed and removed, in the order they were closed.
    pub closed: Vec<K>,
    /// Keys that failed to close, these are still in the map.
    pub failed: Vec<K>,
}

impl<K> EvictionReport<K> {
    fn empty(population: usize) -> Self {
        EvictionReport {
            population,
            candidates: 0,
            closed: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<K, V, C> TrackedMap<K, V, C>
where
    K: Hash + Ord + Clone + Debug,
    V: Eq + Closeable,
    C: Clock,
{
    /// Close the entries selected by `policy`, removing them from the map.
    ///
    /// Candidates are visited in the order returned by [`TrackedMap::matching`]. The first
    /// `min` successfully closed entries are always closed, after that the pass stops as soon as
    /// the policy's cap has been reached.
    ///
    /// A candidate that fails to close stays in the map, doesn't count towards either bound, and
    /// the pass moves on to the next one.
    ///
    /// # Errors
    ///
    /// * If the policy's `min` doesn't resolve to less than its `max` for the current population.
    ///   Nothing is closed and the map isn't reordered.
    pub fn evict(&mut self, policy: &EvictionPolicy) -> Result<EvictionReport<K>, PolicyError> {
        let population = self.len();
        let mut report = EvictionReport::empty(population);
        if population == 0 {
            return Ok(report);
        }

        let bounds = policy.resolve(population)?;
        let candidates: Vec<K> = self
            .matching(policy.condition(), policy.priority())
            .into_iter()
            .map(|(key, _value)| key)
            .collect();
        report.candidates = candidates.len();

        for key in candidates {
            let closed = report.closed.len();
            if closed >= bounds.min && closed >= bounds.cap {
                break;
            }

            let Some(entry) = self.get_entry(&key) else {
                continue;
            };
            match entry.value().close() {
                Ok(()) => {
                    self.remove(&key);
                    tracing::debug!(?key, "evicted");
                    report.closed.push(key);
                }
                Err(err) => {
                    tracing::warn!(?key, %err, "failed to close during eviction");
                    report.failed.push(key);
                }
            }
        }

        tracing::info!(
            population,
            candidates = report.candidates,
            closed = report.closed.len(),
            failed = report.failed.len(),
            min = bounds.min,
            max = bounds.max,
            cap = bounds.cap,
            "eviction pass complete"
        );
        Ok(report)
    }
}
