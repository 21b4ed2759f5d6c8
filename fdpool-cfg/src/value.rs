//! Storage for the values behind a [`Config`](crate::Config).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use compact_str::CompactString;

/// Types that can be provided as a default to a [`Config`](crate::Config).
pub trait ConfigDefault {
    /// The type that actually gets stored in a [`ConfigSet`](crate::ConfigSet).
    type StoredValue: ConfigValue;

    fn into_stored(&self) -> Self::StoredValue;
    fn from_dyn(val: &DynConfigValueShared) -> Self::StoredValue;
}

impl ConfigDefault for u64 {
    type StoredValue = u64;

    fn into_stored(&self) -> Self::StoredValue {
        *self
    }

    fn from_dyn(val: &DynConfigValueShared) -> Self::StoredValue {
        let DynConfigValueShared::U64(val) = val else {
            panic!("programming error, found {val:?} for u64")
        };
        val.load(Ordering::SeqCst)
    }
}

impl ConfigDefault for Duration {
    type StoredValue = Duration;

    fn into_stored(&self) -> Self::StoredValue {
        *self
    }

    fn from_dyn(val: &DynConfigValueShared) -> Self::StoredValue {
        let DynConfigValueShared::Duration(val) = val else {
            panic!("programming error, found {val:?} for duration")
        };
        let read_lock = val
            .read()
            .expect("DynConfigValueShared::Duration lock poisoned");
        *read_lock
    }
}

impl ConfigDefault for &str {
    type StoredValue = CompactString;

    fn into_stored(&self) -> Self::StoredValue {
        CompactString::new(self)
    }

    fn from_dyn(val: &DynConfigValueShared) -> Self::StoredValue {
        let DynConfigValueShared::String(val) = val else {
            panic!("programming error, found {val:?} for string")
        };
        let read_lock = val
            .read()
            .expect("DynConfigValueShared::String lock poisoned");
        read_lock.clone()
    }
}

pub trait ConfigValue {
    fn into_dyn(self) -> DynConfigValue;
}

impl ConfigValue for u64 {
    fn into_dyn(self) -> DynConfigValue {
        DynConfigValue::U64(self)
    }
}

impl ConfigValue for Duration {
    fn into_dyn(self) -> DynConfigValue {
        DynConfigValue::Duration(self)
    }
}

impl ConfigValue for CompactString {
    fn into_dyn(self) -> DynConfigValue {
        DynConfigValue::String(self)
    }
}

/// "Type erased" configuration values.
///
/// We prefer an enum as opposed to something like `Box<dyn Value>` because enums offer better
/// performance and are easier to reason about.
#[derive(Debug)]
pub enum DynConfigValue {
    U64(u64),
    Duration(Duration),
    String(CompactString),
}

impl DynConfigValue {
    pub fn into_shared(self) -> DynConfigValueShared {
        match self {
            DynConfigValue::U64(val) => DynConfigValueShared::U64(Arc::new(AtomicU64::new(val))),
            DynConfigValue::Duration(val) => {
                DynConfigValueShared::Duration(Arc::new(RwLock::new(val)))
            }
            DynConfigValue::String(val) => DynConfigValueShared::String(Arc::new(RwLock::new(val))),
        }
    }
}

/// Shareable instance of [`DynConfigValue`].
#[derive(Clone, Debug)]
pub enum DynConfigValueShared {
    U64(Arc<AtomicU64>),
    Duration(Arc<RwLock<Duration>>),
    String(Arc<RwLock<CompactString>>),
}

impl DynConfigValueShared {
    pub fn update(&self, value: DynConfigValue) {
        match (self, value) {
            (DynConfigValueShared::U64(shared), DynConfigValue::U64(val)) => {
                shared.store(val, Ordering::SeqCst);
            }
            (DynConfigValueShared::Duration(shared), DynConfigValue::Duration(val)) => {
                let mut write_lock = shared
                    .write()
                    .expect("DynConfigValueShared::Duration lock poisoned");
                *write_lock = val;
            }
            (DynConfigValueShared::String(shared), DynConfigValue::String(val)) => {
                let mut write_lock = shared
                    .write()
                    .expect("DynConfigValueShared::String lock poisoned");
                *write_lock = val;
            }
            (shared, val) => unreachable!("tried to update shared {shared:?} with {val:?}"),
        }
    }

    pub fn update_parse(&self, value: &str) -> Result<(), anyhow::Error> {
        let parsed = match self {
            DynConfigValueShared::U64(_) => DynConfigValue::U64(value.parse()?),
            DynConfigValueShared::Duration(_) => DynConfigValue::Duration(parse_duration(value)?),
            DynConfigValueShared::String(_) => DynConfigValue::String(CompactString::new(value)),
        };
        self.update(parsed);
        Ok(())
    }
}

impl fmt::Display for DynConfigValueShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynConfigValueShared::U64(val) => write!(f, "{}", val.load(Ordering::SeqCst)),
            DynConfigValueShared::Duration(val) => {
                let read_lock = val
                    .read()
                    .expect("DynConfigValueShared::Duration lock poisoned");
                write!(f, "{:?}", *read_lock)
            }
            DynConfigValueShared::String(val) => {
                let read_lock = val
                    .read()
                    .expect("DynConfigValueShared::String lock poisoned");
                write!(f, "{}", *read_lock)
            }
        }
    }
}

/// Parses a [`Duration`] of the form `<integer><unit>`.
///
/// Supported units are `ms`, `s`, `m`, and `h`. A bare integer is interpreted as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, anyhow::Error> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (amount, unit) = raw.split_at(split);
    if amount.is_empty() {
        anyhow::bail!("duration '{raw}' is missing an amount");
    }
    let amount: u64 = amount.parse()?;

    let duration = match unit.trim() {
        "ms" => Duration::from_millis(amount),
        "" | "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.saturating_mul(60)),
        "h" => Duration::from_secs(amount.saturating_mul(60 * 60)),
        other => anyhow::bail!("unknown duration unit '{other}'"),
    };
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::parse_duration;

    #[test]
    fn smoketest_parse_duration() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration(" 3s ").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("4d").is_err());
    }
}
