//! An eviction cache for open OS handles.
//!
//! A [`TrackedMap`] tracks a population of open handles keyed by some identity (generally a
//! path) along with when each handle was opened and when it was last used. An eviction pass,
//! [`TrackedMap::evict`], closes a subset of those handles selected by an [`EvictionPolicy`],
//! which is how callers bound the number of descriptors a process holds open at once.
//!
//! Neither type does any locking, callers that share a map across threads are expected to wrap
//! it in a single mutex.

pub mod cfgs;
pub mod clock;
pub mod entry;
pub mod evict;
pub mod map;
pub mod policy;


pub use cfgs::register_configs;
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{Priority, TrackedEntry};
pub use evict::EvictionReport;
pub use map::TrackedMap;
pub use policy::{Bound, EvictionCondition, EvictionPolicy, EvictionPolicyBuilder, PolicyError};

/// A resource that can be released, e.g. a file descriptor.
///
/// A [`TrackedMap`] never closes the values it holds on its own, only an eviction pass calls
/// [`Closeable::close`]. When closing fails the value is assumed to still be open.
pub trait Closeable {
    type Error: std::error::Error;

    /// Release the resource.
    fn close(&self) -> Result<(), Self::Error>;
}
