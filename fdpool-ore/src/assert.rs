//! Utilities for `assert!`s.

/// Asserts that the provided expression, that returns an `Option`, is `None`.
#[macro_export]
macro_rules! assert_none {
    ($val:expr, $($msg:tt)+) => {{
        if let Some(y) = &$val {
            panic!("assertion failed: expected None found Some({y:?}), {}", format!($($msg)+));
        }
    }};
    ($val:expr) => {{
        if let Some(y) = &$val {
            panic!("assertion failed: expected None found Some({y:?})");
        }
    }}
}

/// Asserts that the provided expression, that returns an `Option`, is `Some`, evaluating to the
/// inner value.
///
/// Useful when two structures must agree, e.g. a primary map and a secondary index, and a
/// missing element means they've drifted apart.
#[macro_export]
macro_rules! assert_some {
    ($val:expr, $($msg:tt)+) => {{
        match $val {
            Some(inner) => inner,
            None => panic!("assertion failed: expected Some found None, {}", format!($($msg)+)),
        }
    }};
    ($val:expr) => {{
        match $val {
            Some(inner) => inner,
            None => panic!("assertion failed: expected Some found None"),
        }
    }}
}

#[cfg(test)]
mod tests {
    #[test]
    fn smoketest_assert_some() {
        let val = crate::assert_some!(Some(42));
        assert_eq!(val, 42);
        crate::assert_none!(None::<u8>);
    }

    #[test]
    #[should_panic(expected = "index drifted")]
    fn assert_some_panics_with_message() {
        let _: u8 = crate::assert_some!(None, "index drifted for {}", "foo");
    }
}
