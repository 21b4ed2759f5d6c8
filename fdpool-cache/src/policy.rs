//! Policies that select which handles an eviction pass closes.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use fdpool_ore::cast::CastLossy;

use crate::entry::Priority;

/// Errors from building an [`EvictionPolicy`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("minimum {min} must be less than maximum {max}")]
    MinNotBelowMax { min: Bound, max: Bound },
    #[error("minimum {min} must be less than maximum {max} for a population of {population}")]
    ResolvedMinNotBelowMax {
        min: usize,
        max: usize,
        population: usize,
    },
    #[error("fraction {0} is outside of [0, 1)")]
    InvalidFraction(f64),
    #[error("invalid bound '{0}'")]
    InvalidBound(String),
    #[error("unknown priority '{0}', expected 'added' or 'used'")]
    UnknownPriority(String),
}

/// A limit on the number of handles closed by an eviction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Bound {
    /// No limit, resolves to the full population.
    #[default]
    Unset,
    /// An absolute number of entries.
    Count(usize),
    /// A fraction, in `[0, 1)`, of the population.
    Fraction(f64),
}

impl Bound {
    /// Interprets `value` the way a single numeric knob would be: values in `[0, 1)` are a
    /// fraction of the population, other non-negative values are a count, negative values (and
    /// `NaN`) leave the bound unset.
    pub fn from_f64(value: f64) -> Bound {
        if value.is_nan() || value < 0.0 {
            Bound::Unset
        } else if value < 1.0 {
            Bound::Fraction(value)
        } else {
            Bound::Count(usize::cast_lossy(value))
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Bound::Unset)
    }

    /// Resolve this bound against a population of `population` entries, `None` if unset.
    pub fn resolve(&self, population: usize) -> Option<usize> {
        match self {
            Bound::Unset => None,
            Bound::Count(count) => Some(*count),
            Bound::Fraction(fraction) => {
                Some(usize::cast_lossy(fraction * f64::cast_lossy(population)))
            }
        }
    }

    fn validate(&self) -> Result<(), PolicyError> {
        match self {
            Bound::Fraction(fraction) if !(0.0..1.0).contains(fraction) => {
                Err(PolicyError::InvalidFraction(*fraction))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Unset => write!(f, "unset"),
            Bound::Count(count) => write!(f, "{count}"),
            Bound::Fraction(fraction) => write!(f, "{fraction}"),
        }
    }
}

impl FromStr for Bound {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("unset") {
            return Ok(Bound::Unset);
        }
        if let Ok(count) = s.parse::<usize>() {
            return Ok(Bound::Count(count));
        }
        match s.parse::<f64>() {
            Ok(value) if value >= 0.0 => Ok(Bound::from_f64(value)),
            _ => Err(PolicyError::InvalidBound(s.to_string())),
        }
    }
}

/// Which entries of a [`TrackedMap`](crate::TrackedMap) an eviction pass considers.
///
/// `threshold` is a minimum population: when fewer entries match than `threshold`, none of
/// them are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionCondition {
    /// Entries whose timestamp is at least `age` in the past.
    OlderThan { age: Duration, threshold: usize },
    /// Entries whose timestamp is less than `age` in the past.
    NewerThan { age: Duration, threshold: usize },
}

impl EvictionCondition {
    pub const fn older_than(age: Duration) -> Self {
        EvictionCondition::OlderThan { age, threshold: 0 }
    }

    pub const fn newer_than(age: Duration) -> Self {
        EvictionCondition::NewerThan { age, threshold: 0 }
    }

    /// Every entry, oldest first.
    pub const fn all() -> Self {
        EvictionCondition::older_than(Duration::ZERO)
    }

    pub const fn with_threshold(self, threshold: usize) -> Self {
        match self {
            EvictionCondition::OlderThan { age, .. } => {
                EvictionCondition::OlderThan { age, threshold }
            }
            EvictionCondition::NewerThan { age, .. } => {
                EvictionCondition::NewerThan { age, threshold }
            }
        }
    }

    pub const fn threshold(&self) -> usize {
        match self {
            EvictionCondition::OlderThan { threshold, .. }
            | EvictionCondition::NewerThan { threshold, .. } => *threshold,
        }
    }

    /// Returns whether an entry of the provided `age` satisfies this condition.
    pub fn admits(&self, age: Duration) -> bool {
        match self {
            EvictionCondition::OlderThan { age: limit, .. } => age >= *limit,
            EvictionCondition::NewerThan { age: limit, .. } => age < *limit,
        }
    }
}

/// Describes which, and how many, handles an eviction pass should close.
///
/// Built with [`EvictionPolicy::builder`], which rejects bounds that can never be satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionPolicy {
    condition: EvictionCondition,
    priority: Priority,
    min: Bound,
    max: Bound,
    percentage: Bound,
}

/// Bounds of an [`EvictionPolicy`] resolved against a specific population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedBounds {
    /// Number of entries to close regardless of `cap`.
    pub min: usize,
    /// `max` on its own, always greater than `min`.
    pub max: usize,
    /// Number of entries after which a pass stops.
    pub cap: usize,
}

impl EvictionPolicy {
    pub fn builder(condition: EvictionCondition) -> EvictionPolicyBuilder {
        EvictionPolicyBuilder {
            condition,
            priority: Priority::Added,
            min: Bound::Count(0),
            max: Bound::Unset,
            percentage: Bound::Unset,
        }
    }

    pub fn condition(&self) -> EvictionCondition {
        self.condition
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn min(&self) -> Bound {
        self.min
    }

    pub fn max(&self) -> Bound {
        self.max
    }

    pub fn percentage(&self) -> Bound {
        self.percentage
    }

    /// Resolve the bounds of this policy against `population` entries.
    ///
    /// The cap is the larger of `max` and `percentage`, so a percentage can raise an explicit
    /// maximum but never lower it. When neither is set the cap is the whole population.
    ///
    /// # Errors
    ///
    /// * If `min` doesn't resolve to less than `max`, e.g. `min` of 3 and `max` of 20% of 10.
    pub(crate) fn resolve(&self, population: usize) -> Result<ResolvedBounds, PolicyError> {
        let min = self.min.resolve(population).unwrap_or(population);
        let max = self.max.resolve(population).unwrap_or(population);
        if min >= max {
            return Err(PolicyError::ResolvedMinNotBelowMax {
                min,
                max,
                population,
            });
        }

        let cap = match (
            self.max.resolve(population),
            self.percentage.resolve(population),
        ) {
            (None, None) => population,
            (Some(max), None) => max,
            (None, Some(percentage)) => percentage,
            (Some(max), Some(percentage)) => max.max(percentage),
        };
        Ok(ResolvedBounds { min, max, cap })
    }
}

/// Builder for an [`EvictionPolicy`].
#[derive(Debug, Clone)]
pub struct EvictionPolicyBuilder {
    condition: EvictionCondition,
    priority: Priority,
    min: Bound,
    max: Bound,
    percentage: Bound,
}

impl EvictionPolicyBuilder {
    /// Timestamp used to order candidates, defaults to [`Priority::Added`].
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Number of candidates to close before the cap applies, defaults to `0`.
    pub fn min(mut self, min: Bound) -> Self {
        self.min = min;
        self
    }

    /// Maximum number of candidates to close, defaults to unset.
    pub fn max(mut self, max: Bound) -> Self {
        self.max = max;
        self
    }

    /// Portion of the population that may be closed, defaults to unset.
    pub fn percentage(mut self, percentage: Bound) -> Self {
        self.percentage = percentage;
        self
    }

    /// Build the [`EvictionPolicy`].
    ///
    /// # Errors
    ///
    /// * If any fraction is outside of `[0, 1)`.
    /// * If `min` is not less than `max`, when the two can be compared without knowing the
    ///   population. Pairs that can't are checked again by every eviction pass.
    /// * If `min` is unset, it would resolve to the whole population which no `max` allows.
    pub fn build(self) -> Result<EvictionPolicy, PolicyError> {
        self.min.validate()?;
        self.max.validate()?;
        self.percentage.validate()?;

        let ordered = match (self.min, self.max) {
            (Bound::Count(min), Bound::Count(max)) => min < max,
            (Bound::Fraction(min), Bound::Fraction(max)) => min < max,
            (Bound::Unset, _) => false,
            // Everything else depends on the population, which we don't know yet.
            _ => true,
        };
        if !ordered {
            return Err(PolicyError::MinNotBelowMax {
                min: self.min,
                max: self.max,
            });
        }

        Ok(EvictionPolicy {
            condition: self.condition,
            priority: self.priority,
            min: self.min,
            max: self.max,
            percentage: self.percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn smoketest_bound_resolve() {
        assert_eq!(Bound::Unset.resolve(10), None);
        assert_eq!(Bound::Count(3).resolve(10), Some(3));
        assert_eq!(Bound::Fraction(0.5).resolve(10), Some(5));
        assert_eq!(Bound::Fraction(0.25).resolve(10), Some(2));
        assert_eq!(Bound::Fraction(0.99).resolve(0), Some(0));
    }

    #[test]
    fn bound_from_f64() {
        assert_eq!(Bound::from_f64(0.5), Bound::Fraction(0.5));
        assert_eq!(Bound::from_f64(0.0), Bound::Fraction(0.0));
        assert_eq!(Bound::from_f64(1.0), Bound::Count(1));
        assert_eq!(Bound::from_f64(12.7), Bound::Count(12));
        assert_eq!(Bound::from_f64(-1.0), Bound::Unset);
    }

    #[test]
    fn bound_from_str() {
        assert_eq!("unset".parse::<Bound>().unwrap(), Bound::Unset);
        assert_eq!("".parse::<Bound>().unwrap(), Bound::Unset);
        assert_eq!("10".parse::<Bound>().unwrap(), Bound::Count(10));
        assert_eq!("0.3".parse::<Bound>().unwrap(), Bound::Fraction(0.3));
        assert_eq!("-2".parse::<Bound>(), Err(PolicyError::InvalidBound("-2".into())));
        assert!("lots".parse::<Bound>().is_err());
    }

    #[test]
    fn condition_admits() {
        let old = EvictionCondition::older_than(Duration::from_secs(60));
        assert!(old.admits(Duration::from_secs(60)));
        assert!(!old.admits(Duration::from_secs(59)));

        let new = EvictionCondition::newer_than(Duration::from_secs(60)).with_threshold(4);
        assert!(new.admits(Duration::from_secs(59)));
        assert!(!new.admits(Duration::from_secs(60)));
        assert_eq!(new.threshold(), 4);

        assert!(EvictionCondition::all().admits(Duration::ZERO));
    }

    #[test]
    fn build_rejects_unordered_bounds() {
        let builder = EvictionPolicy::builder(EvictionCondition::all());

        let err = builder
            .clone()
            .min(Bound::Count(2))
            .max(Bound::Count(2))
            .build()
            .unwrap_err();
        assert!(matches!(err, PolicyError::MinNotBelowMax { .. }));

        let err = builder
            .clone()
            .min(Bound::Fraction(0.6))
            .max(Bound::Fraction(0.5))
            .build()
            .unwrap_err();
        assert!(matches!(err, PolicyError::MinNotBelowMax { .. }));

        let err = builder.clone().min(Bound::Unset).build().unwrap_err();
        assert!(matches!(err, PolicyError::MinNotBelowMax { .. }));

        let err = builder
            .clone()
            .min(Bound::Unset)
            .max(Bound::Count(2))
            .build()
            .unwrap_err();
        assert!(matches!(err, PolicyError::MinNotBelowMax { .. }));

        let err = builder.clone().percentage(Bound::Fraction(1.5)).build().unwrap_err();
        assert_eq!(err, PolicyError::InvalidFraction(1.5));

        builder
            .min(Bound::Count(1))
            .max(Bound::Fraction(0.5))
            .build()
            .unwrap();
    }

    #[test]
    fn resolve_cap() {
        let condition = EvictionCondition::all();

        // Neither max nor percentage, everything.
        let policy = EvictionPolicy::builder(condition).build().unwrap();
        assert_eq!(
            policy.resolve(10),
            Ok(ResolvedBounds {
                min: 0,
                max: 10,
                cap: 10
            })
        );

        // Percentage raises an explicit max.
        let policy = EvictionPolicy::builder(condition)
            .max(Bound::Count(2))
            .percentage(Bound::Fraction(0.5))
            .build()
            .unwrap();
        assert_eq!(
            policy.resolve(10),
            Ok(ResolvedBounds {
                min: 0,
                max: 2,
                cap: 5
            })
        );

        // But never lowers it.
        let policy = EvictionPolicy::builder(condition)
            .max(Bound::Count(8))
            .percentage(Bound::Fraction(0.5))
            .build()
            .unwrap();
        assert_eq!(
            policy.resolve(10),
            Ok(ResolvedBounds {
                min: 0,
                max: 8,
                cap: 8
            })
        );
    }

    #[test]
    fn resolve_rejects_mixed_bounds() {
        let condition = EvictionCondition::all();

        // A count against a fraction can only be compared once we know the population.
        let policy = EvictionPolicy::builder(condition)
            .min(Bound::Count(3))
            .max(Bound::Fraction(0.2))
            .build()
            .unwrap();
        assert_eq!(
            policy.resolve(10),
            Err(PolicyError::ResolvedMinNotBelowMax {
                min: 3,
                max: 2,
                population: 10
            })
        );
        assert!(policy.resolve(20).is_ok());

        let policy = EvictionPolicy::builder(condition)
            .min(Bound::Fraction(0.5))
            .max(Bound::Count(4))
            .build()
            .unwrap();
        assert!(policy.resolve(10).is_err());
        assert!(policy.resolve(6).is_ok());

        // An unset max is the whole population.
        let policy = EvictionPolicy::builder(condition)
            .min(Bound::Count(5))
            .build()
            .unwrap();
        assert!(policy.resolve(5).is_err());
        assert!(policy.resolve(6).is_ok());
    }
}
