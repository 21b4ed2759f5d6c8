//! Identity of a handle within a [`HandlePool`](crate::HandlePool).

use std::fmt;

/// Path of a file opened through a [`HandlePool`](crate::HandlePool).
///
/// This is treated as an opaque key, it is not normalized, so two spellings of the same file
/// (e.g. `a/b` and `a/./b`) are tracked as different handles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolPath {
    inner: String,
}

impl PoolPath {
    /// Create a new [`PoolPath`].
    ///
    /// # Errors
    ///
    /// * If `val` is empty or contains an interior nul byte, neither of which can be passed to
    ///   the OS.
    pub fn new(val: impl Into<String>) -> Result<Self, crate::Error> {
        let inner = val.into();
        if inner.is_empty() || inner.contains('\0') {
            return Err(crate::Error::InvalidPath(inner));
        }
        Ok(PoolPath { inner })
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for PoolPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl std::borrow::Borrow<str> for PoolPath {
    fn borrow(&self) -> &str {
        &self.inner
    }
}
