//! A pool of open file handles that closes them automatically.
//!
//! [`HandlePool`] is the entry point: opening a path through the pool reuses a handle that's
//! already open, and handles that go unused are closed by eviction passes, either when the pool
//! grows past [`MAX_OPEN_HANDLES`] or periodically from a background task.
//!
//! The platform layer is intentionally small, a handle only needs to be opened, closed, and
//! occasionally `fstat`-ed.

use fdpool_cfg::{Config, ConfigSetBuilder};
use std::time::Duration;

pub mod handle;
pub mod path;
pub mod platform;
pub mod pool;

#[cfg(test)]
mod tests;

pub use handle::Descriptor;
pub use path::PoolPath;
pub use platform::OpenOptions;
pub use pool::HandlePool;

/// Maximum number of handles a [`HandlePool`] keeps open.
pub static MAX_OPEN_HANDLES: Config<u64> = Config::new(
    "max_open_handles",
    "Maximum number of handles kept open by the pool, 0 uses half of the process limit.",
    0,
);

/// How often a background evictor runs.
pub static EVICTION_INTERVAL: Config<Duration> = Config::new(
    "eviction_interval",
    "How often the background evictor closes stale handles.",
    Duration::from_secs(30),
);

/// Register every [`Config`] used by this crate, including those of [`fdpool_cache`].
pub fn register_configs(builder: &mut ConfigSetBuilder) {
    fdpool_cache::register_configs(builder);
    builder
        .register(&MAX_OPEN_HANDLES)
        .register(&EVICTION_INTERVAL);
}

/// Metadata about an open handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Size of the file in bytes.
    pub size: u64,
    /// Inode number of the file.
    pub inode: u64,
    /// File mode/permissions.
    pub mode: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{op} failed: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid path {0:?}")]
    InvalidPath(String),
    #[error("{0} is already open read-only")]
    ReadOnly(String),
    #[error("filesystem operations are not supported on this platform")]
    Unsupported,
}

impl Error {
    /// Creates an [`Error::Os`] from the current value of `errno`.
    pub(crate) fn last_os_error(op: &'static str) -> Self {
        Error::Os {
            op,
            source: std::io::Error::last_os_error(),
        }
    }

    /// The `errno` that caused this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Os { source, .. } => source.raw_os_error(),
            Error::InvalidPath(_) | Error::ReadOnly(_) | Error::Unsupported => None,
        }
    }
}
