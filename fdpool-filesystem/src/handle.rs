//! Module that defines a handle tracked by a [`HandlePool`](crate::HandlePool).

use fdpool_cache::Closeable;

use crate::platform::{FilesystemPlatform, OpenOptions, Platform, PlatformHandleType};
use crate::FileStat;

/// An open OS handle, generally a file descriptor.
///
/// [`Descriptor`]s returned from a [`HandlePool`](crate::HandlePool) are owned by the pool and
/// may be closed by an eviction pass at any point after the pool's lock is released. Callers
/// should re-open through the pool rather than hold onto one, and close them with
/// [`HandlePool::close`](crate::HandlePool::close) rather than [`Closeable::close`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    inner: PlatformHandleType,
    options: OpenOptions,
}

impl Descriptor {
    pub(crate) fn from_raw(inner: PlatformHandleType, options: OpenOptions) -> Self {
        Descriptor { inner, options }
    }

    /// The raw platform handle.
    pub fn as_raw(&self) -> PlatformHandleType {
        self.inner
    }

    /// The [`OpenOptions`] this handle was opened with.
    pub fn options(&self) -> OpenOptions {
        self.options
    }

    /// Get metadata about this handle.
    pub fn stat(&self) -> Result<FileStat, crate::Error> {
        FilesystemPlatform::fstat(self.inner)
    }
}

impl Closeable for Descriptor {
    type Error = crate::Error;

    fn close(&self) -> Result<(), crate::Error> {
        FilesystemPlatform::close(self.inner)
    }
}
