//! A value in a [`TrackedMap`](crate::TrackedMap) along with its timestamps.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::policy::PolicyError;

/// Which timestamp of a [`TrackedEntry`] determines ordering.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Order by when the entry was inserted.
    #[default]
    Added,
    /// Order by when the entry was last looked up.
    Used,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Added => write!(f, "added"),
            Priority::Used => write!(f, "used"),
        }
    }
}

impl FromStr for Priority {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "added" => Ok(Priority::Added),
            "used" => Ok(Priority::Used),
            other => Err(PolicyError::UnknownPriority(other.to_string())),
        }
    }
}

/// A value along with when it was added and when it was last used.
///
/// `used_at` starts out equal to `added_at` and only ever moves forward, so
/// `used_at >= added_at` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntry<V> {
    value: V,
    added_at: Instant,
    used_at: Instant,
}

impl<V> TrackedEntry<V> {
    pub(crate) fn new(value: V, now: Instant) -> Self {
        TrackedEntry {
            value,
            added_at: now,
            used_at: now,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn added_at(&self) -> Instant {
        self.added_at
    }

    pub fn used_at(&self) -> Instant {
        self.used_at
    }

    /// The timestamp that orders this entry under `priority`.
    pub fn timestamp(&self, priority: Priority) -> Instant {
        match priority {
            Priority::Added => self.added_at,
            Priority::Used => self.used_at,
        }
    }

    /// Mark this entry as used at `now`.
    pub(crate) fn touch(&mut self, now: Instant) {
        self.used_at = self.used_at.max(now);
    }

    pub(crate) fn into_value(self) -> V {
        self.value
    }
}
