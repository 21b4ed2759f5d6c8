//! Placeholder Platform for targets we don't support yet, every operation fails.

use crate::platform::{OpenOptions, Platform};
use crate::{FileStat, PoolPath};

pub struct UnsupportedPlatform;

impl Platform for UnsupportedPlatform {
    type Handle = u64;

    fn open(_path: &PoolPath, _options: OpenOptions) -> Result<Self::Handle, crate::Error> {
        Err(crate::Error::Unsupported)
    }

    fn close(_handle: Self::Handle) -> Result<(), crate::Error> {
        Err(crate::Error::Unsupported)
    }

    fn fstat(_handle: Self::Handle) -> Result<FileStat, crate::Error> {
        Err(crate::Error::Unsupported)
    }

    fn file_handle_max() -> Result<usize, crate::Error> {
        Err(crate::Error::Unsupported)
    }
}
