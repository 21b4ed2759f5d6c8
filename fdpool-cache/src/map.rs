//! A map of open handles ordered by when they were added or last used.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Index;
use std::time::Instant;

use derivative::Derivative;
use fdpool_ore::id_gen::Gen;
use fdpool_ore::{assert_none, assert_some};

use crate::clock::{self, Clock, SystemClock};
use crate::entry::{Priority, TrackedEntry};
use crate::policy::EvictionCondition;

/// Location of an entry within the ordering of a [`TrackedMap`].
///
/// `seq` is handed out in increasing order, so entries with equal timestamps are ordered by
/// when they were placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Position {
    at: Instant,
    seq: u64,
}

#[derive(Debug)]
struct Slot<V> {
    entry: TrackedEntry<V>,
    position: Position,
}

/// A keyed collection of values, kept in order by one of their two timestamps.
///
/// Every value is wrapped in a [`TrackedEntry`] recording when it was inserted and when it was
/// last returned from [`TrackedMap::lookup`]. Which of those timestamps orders the map is its
/// [`Priority`], iteration and positional indexing follow that order from oldest to newest.
///
/// The map owns its values but never closes them, removing an entry hands the value back to the
/// caller.
#[derive(Derivative)]
#[derivative(Debug(bound = "K: Debug, V: Debug"))]
pub struct TrackedMap<K, V, C = SystemClock> {
    /// All of the entries, keyed for point lookups.
    entries: HashMap<K, Slot<V>>,
    /// Index of every entry by its [`Position`] under the current priority.
    order: BTreeMap<Position, K>,
    /// Timestamp that currently determines order.
    priority: Priority,
    /// Tie-breakers for [`Position`]s.
    seqs: Gen<u64>,
    #[derivative(Debug = "ignore")]
    clock: C,
}

impl<K, V> TrackedMap<K, V, SystemClock>
where
    K: Hash + Ord + Clone + Debug,
    V: Eq,
{
    /// Create an empty [`TrackedMap`] ordered by [`Priority::Added`].
    pub fn new() -> Self {
        TrackedMap::with_clock(SystemClock)
    }
}

impl<K, V> Default for TrackedMap<K, V, SystemClock>
where
    K: Hash + Ord + Clone + Debug,
    V: Eq,
{
    fn default() -> Self {
        TrackedMap::new()
    }
}

impl<K, V, C> TrackedMap<K, V, C>
where
    K: Hash + Ord + Clone + Debug,
    V: Eq,
    C: Clock,
{
    /// Create an empty [`TrackedMap`] that reads time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        TrackedMap {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            priority: Priority::default(),
            seqs: Gen::default(),
            clock,
        }
    }

    /// Number of entries in the map.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The [`Priority`] that currently orders this map.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Returns the [`TrackedEntry`] for `key` without marking it as used.
    pub fn get_entry<Q>(&self, key: &Q) -> Option<&TrackedEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    /// Insert `value` for `key`, returning the value it replaced, if any.
    ///
    /// Inserting a value equal to the one already stored for `key` does nothing, the existing
    /// entry keeps its timestamps and position. A different value replaces the entry entirely,
    /// the caller is responsible for closing whatever value is returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(slot) = self.entries.get(&key) {
            if slot.entry.value() == &value {
                return None;
            }
        }
        let replaced = self.remove(&key);

        let entry = TrackedEntry::new(value, self.clock.now());
        let position = Position {
            at: entry.timestamp(self.priority),
            seq: self.seqs.next(),
        };
        let prev = self.order.insert(position, key.clone());
        assert_none!(prev, "duplicate position in TrackedMap");
        self.entries.insert(key, Slot { entry, position });

        replaced
    }

    /// Remove the entry for `key`, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.entries.remove(key)?;
        let _ = assert_some!(
            self.order.remove(&slot.position),
            "TrackedMap order is missing an entry"
        );
        Some(slot.entry.into_value())
    }

    /// Returns the value for `key`, marking it as used.
    ///
    /// When the map is ordered by [`Priority::Used`] the entry moves to the newest position.
    pub fn lookup<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let slot = self.entries.get_mut(key)?;
        slot.entry.touch(now);

        if self.priority == Priority::Used {
            let key = assert_some!(
                self.order.remove(&slot.position),
                "TrackedMap order is missing an entry"
            );
            slot.position = Position {
                at: slot.entry.used_at(),
                seq: self.seqs.next(),
            };
            let prev = self.order.insert(slot.position, key);
            assert_none!(prev, "duplicate position in TrackedMap");
        }

        Some(slot.entry.value())
    }

    /// Order this map by `priority`.
    ///
    /// If `priority` differs from the current one every entry is re-placed using its new
    /// timestamp, entries with equal timestamps keep their previous relative order.
    pub fn reorder(&mut self, priority: Priority) {
        if self.priority == priority {
            return;
        }
        tracing::debug!(from = %self.priority, to = %priority, len = self.len(), "reordering");

        self.priority = priority;
        let previous = std::mem::take(&mut self.order);
        for key in previous.into_values() {
            let slot = assert_some!(
                self.entries.get_mut(&key),
                "TrackedMap order has an extra entry"
            );
            slot.position = Position {
                at: slot.entry.timestamp(priority),
                seq: self.seqs.next(),
            };
            let prev = self.order.insert(slot.position, key);
            assert_none!(prev, "duplicate position in TrackedMap");
        }
    }

    /// Returns every entry that satisfies `condition`, ordered by `priority`.
    ///
    /// Entries matching [`EvictionCondition::OlderThan`] are returned oldest first, entries
    /// matching [`EvictionCondition::NewerThan`] newest first. If fewer entries match than the
    /// condition's threshold, nothing is returned.
    ///
    /// Changes the priority of the map to `priority`, see [`TrackedMap::reorder`].
    pub fn matching(&mut self, condition: EvictionCondition, priority: Priority) -> Vec<(K, &V)> {
        self.reorder(priority);

        let now = self.clock.now();
        let entries = &self.entries;
        let admits = |position: &Position| condition.admits(clock::age(now, position.at));
        let resolve = |(_, key): (&Position, &K)| {
            let slot = &entries[key];
            (key.clone(), slot.entry.value())
        };

        // Entries are ordered by timestamp so everything that matches is a prefix (or suffix).
        let matches: Vec<_> = match condition {
            EvictionCondition::OlderThan { .. } => self
                .order
                .iter()
                .take_while(|(position, _)| admits(*position))
                .map(resolve)
                .collect(),
            EvictionCondition::NewerThan { .. } => self
                .order
                .iter()
                .rev()
                .take_while(|(position, _)| admits(*position))
                .map(resolve)
                .collect(),
        };

        if matches.len() < condition.threshold() {
            tracing::trace!(
                matches = matches.len(),
                threshold = condition.threshold(),
                "matches below threshold"
            );
            return Vec::new();
        }
        matches
    }

    /// Iterate over all entries in order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &TrackedEntry<V>)> + '_ {
        self.order
            .values()
            .map(|key| (key, &self.entries[key].entry))
    }

    /// Returns the key and value at `position` in iteration order.
    pub fn get_index(&self, position: usize) -> Option<(&K, &V)> {
        let key = self.order.values().nth(position)?;
        Some((key, self.entries[key].entry.value()))
    }
}

impl<K, V, C> Index<usize> for TrackedMap<K, V, C>
where
    K: Hash + Ord + Clone + Debug,
    V: Eq,
    C: Clock,
{
    type Output = V;

    /// # Panics
    /// * If `position` is out of bounds.
    fn index(&self, position: usize) -> &V {
        match self.get_index(position) {
            Some((_, value)) => value,
            None => panic!(
                "position {position} out of range for TrackedMap of length {}",
                self.len()
            ),
        }
    }
}
