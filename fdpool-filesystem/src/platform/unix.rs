//! Platform for unix-like systems, implemented with `libc`.

use std::ffi::CString;
use std::mem::MaybeUninit;

use crate::platform::{OpenOptions, Platform};
use crate::{FileStat, PoolPath};

/// Mode for files created with [`OpenOptions::CREATE`].
const CREATE_MODE: libc::c_uint = 0o644;

pub struct UnixPlatform;

fn check_result(op: &'static str, val: libc::c_int) -> Result<libc::c_int, crate::Error> {
    if val == -1 {
        Err(crate::Error::last_os_error(op))
    } else {
        Ok(val)
    }
}

fn open_flags(options: OpenOptions) -> libc::c_int {
    let mut flags = if options.contains(OpenOptions::READ_WRITE) {
        libc::O_RDWR
    } else {
        libc::O_RDONLY
    };

    if options.contains(OpenOptions::APPEND) {
        flags |= libc::O_APPEND;
    }
    if options.contains(OpenOptions::CREATE) {
        flags |= libc::O_CREAT;
    }
    if options.contains(OpenOptions::EXCLUSIVE) {
        flags |= libc::O_EXCL;
    }
    if options.contains(OpenOptions::TRUNCATE) {
        flags |= libc::O_TRUNC;
    }
    if options.contains(OpenOptions::DIRECTORY) {
        flags |= libc::O_DIRECTORY;
    }

    // Handles in the pool are never meant to leak into child processes.
    flags | libc::O_CLOEXEC
}

impl Platform for UnixPlatform {
    type Handle = libc::c_int;

    fn open(path: &PoolPath, options: OpenOptions) -> Result<Self::Handle, crate::Error> {
        let raw_path = CString::new(path.as_str())
            .map_err(|_| crate::Error::InvalidPath(path.to_string()))?;
        let flags = open_flags(options);

        // SAFETY: `raw_path` is a valid nul terminated string that outlives the call.
        let result = unsafe { libc::open(raw_path.as_ptr(), flags, CREATE_MODE) };
        let fd = check_result("open", result)?;
        tracing::trace!(%path, fd, "opened");

        Ok(fd)
    }

    fn close(handle: Self::Handle) -> Result<(), crate::Error> {
        // SAFETY: Closing an invalid descriptor is reported through errno, not UB.
        let result = unsafe { libc::close(handle) };
        check_result("close", result)?;
        tracing::trace!(fd = handle, "closed");
        Ok(())
    }

    fn fstat(handle: Self::Handle) -> Result<FileStat, crate::Error> {
        let mut raw_stat = MaybeUninit::<libc::stat>::uninit();

        // SAFETY: `raw_stat` is a valid place for `fstat` to write to.
        let result = unsafe { libc::fstat(handle, raw_stat.as_mut_ptr()) };
        check_result("fstat", result)?;
        // SAFETY: `fstat` succeeded so it initialized `raw_stat`.
        let raw_stat = unsafe { raw_stat.assume_init() };

        Ok(FileStat {
            size: u64::try_from(raw_stat.st_size).unwrap_or_default(),
            inode: u64::from(raw_stat.st_ino),
            mode: u32::from(raw_stat.st_mode),
        })
    }

    fn file_handle_max() -> Result<usize, crate::Error> {
        let mut limits = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };

        // SAFETY: `limits` is a valid place for `getrlimit` to write to.
        let result = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limits) };
        check_result("getrlimit", result)?;

        if limits.rlim_cur == libc::RLIM_INFINITY {
            return Ok(usize::MAX);
        }
        Ok(usize::try_from(limits.rlim_cur).unwrap_or(usize::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoketest_open_flags() {
        assert_eq!(
            open_flags(OpenOptions::READ_ONLY),
            libc::O_RDONLY | libc::O_CLOEXEC
        );
        assert_eq!(
            open_flags(OpenOptions::READ_WRITE | OpenOptions::CREATE | OpenOptions::TRUNCATE),
            libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC | libc::O_CLOEXEC
        );
    }

    #[test]
    fn smoketest_file_handle_max() {
        let max = UnixPlatform::file_handle_max().unwrap();
        assert!(max > 0);
    }

    #[test]
    fn open_missing_file() {
        let path = PoolPath::new("/this/path/should/not/exist").unwrap();
        let err = UnixPlatform::open(&path, OpenOptions::READ_ONLY).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}
