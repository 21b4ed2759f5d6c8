//! Abstract interface for a specific platform, e.g. `unix`.

use bitflags::bitflags;
use std::fmt::Debug;
use std::hash::Hash;

use crate::{Error, FileStat, PoolPath};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenOptions: u32 {
        const READ_ONLY = 0b0000_0001;
        const READ_WRITE = 0b0000_0010;

        const APPEND = 0b0000_0100;
        const CREATE = 0b0000_1000;
        const EXCLUSIVE = 0b0001_0000;
        const TRUNCATE = 0b0010_0000;

        /// Restrict opening to just directories.
        const DIRECTORY = 0b0100_0000;
    }
}

impl OpenOptions {
    /// Returns if a handle opened with these options can be written to.
    pub fn is_writable(&self) -> bool {
        self.contains(OpenOptions::READ_WRITE)
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions::READ_ONLY
    }
}

/// Platform specific operations needed to manage a pool of handles.
pub trait Platform {
    type Handle: Debug + Copy + Eq + Hash + Send + 'static;

    fn open(path: &PoolPath, options: OpenOptions) -> Result<Self::Handle, Error>;
    fn close(handle: Self::Handle) -> Result<(), Error>;
    fn fstat(handle: Self::Handle) -> Result<FileStat, Error>;

    /// The soft limit on the number of handles this process can have open.
    fn file_handle_max() -> Result<usize, Error>;
}

/// Type alias for the [`Platform::Handle`] associated type for the current [`FilesystemPlatform`].
pub type PlatformHandleType = <FilesystemPlatform as Platform>::Handle;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::UnixPlatform as FilesystemPlatform;
    } else {
        mod unsupported;
        pub use unsupported::UnsupportedPlatform as FilesystemPlatform;
    }
}
