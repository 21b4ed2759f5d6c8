//! [`Config`]s for eviction policies.

use std::time::Duration;

use fdpool_cfg::{Config, ConfigSet, ConfigSetBuilder};
use fdpool_ore::cast::CastFrom;

use crate::entry::Priority;
use crate::policy::{Bound, EvictionCondition, EvictionPolicy};

pub static EVICTION_AGE: Config<Duration> = Config::new(
    "eviction_age",
    "Handles unused for at least this long are candidates for eviction.",
    Duration::from_secs(5 * 60),
);

pub static EVICTION_THRESHOLD: Config<u64> = Config::new(
    "eviction_threshold",
    "Skip eviction entirely unless at least this many handles are candidates.",
    0,
);

pub static EVICTION_PRIORITY: Config<&'static str> = Config::new(
    "eviction_priority",
    "Which timestamp orders candidates for eviction, 'added' or 'used'.",
    "used",
);

pub static EVICTION_MIN: Config<&'static str> = Config::new(
    "eviction_min",
    "Minimum number (or fraction in [0, 1)) of handles an eviction pass closes.",
    "0",
);

pub static EVICTION_MAX: Config<&'static str> = Config::new(
    "eviction_max",
    "Maximum number (or fraction in [0, 1)) of handles an eviction pass closes.",
    "unset",
);

pub static EVICTION_PERCENTAGE: Config<&'static str> = Config::new(
    "eviction_percentage",
    "Fraction of handles an eviction pass may close, can only raise eviction_max.",
    "unset",
);

/// Register all of the eviction [`Config`]s with `builder`.
pub fn register_configs(builder: &mut ConfigSetBuilder) {
    builder
        .register(&EVICTION_AGE)
        .register(&EVICTION_THRESHOLD)
        .register(&EVICTION_PRIORITY)
        .register(&EVICTION_MIN)
        .register(&EVICTION_MAX)
        .register(&EVICTION_PERCENTAGE);
}

impl EvictionPolicy {
    /// Build an [`EvictionPolicy`] from the current values in `set`.
    ///
    /// The condition is always [`EvictionCondition::OlderThan`] [`EVICTION_AGE`].
    pub fn from_configs(set: &ConfigSet) -> Result<EvictionPolicy, anyhow::Error> {
        let threshold = usize::cast_from(EVICTION_THRESHOLD.read(set));
        let condition =
            EvictionCondition::older_than(EVICTION_AGE.read(set)).with_threshold(threshold);
        let priority: Priority = EVICTION_PRIORITY.read(set).parse()?;
        let min: Bound = EVICTION_MIN.read(set).parse()?;
        let max: Bound = EVICTION_MAX.read(set).parse()?;
        let percentage: Bound = EVICTION_PERCENTAGE.read(set).parse()?;

        let policy = EvictionPolicy::builder(condition)
            .priority(priority)
            .min(min)
            .max(max)
            .percentage(percentage)
            .build()?;
        Ok(policy)
    }
}
