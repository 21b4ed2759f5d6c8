//! Utilities to cast between numeric types.

/// A trait for safe and infallible casts.
///
/// You can easily cast between integers using the `as` keywords, but these casts aren't always
/// safe, e.g. using `as` you can cast a `u64` to a `u32` but you'll lose precision.
///
/// This trait facilitates casts that are always known to be safe.
pub trait CastFrom<T> {
    fn cast_from(from: T) -> Self;
}

/// A trait for casts that may lose precision, where the loss is acceptable to the caller.
///
/// Float to integer casts truncate towards zero and saturate at the bounds of the target type,
/// `NaN` becomes `0`.
pub trait CastLossy<T> {
    fn cast_lossy(from: T) -> Self;
}

macro_rules! cast_from {
    ($from:ty, $to:ty) => {
        paste::paste! {
            impl crate::cast::CastFrom<$from> for $to {
                #[allow(clippy::as_conversions)]
                fn cast_from(from: $from) -> $to {
                    from as $to
                }
            }

            /// Casts [`$from`] to [`$to`].
            ///
            /// This is equivalent to the [`crate::cast::CastFrom`] implementation but is
            /// available as a `const fn`.
            #[allow(clippy::as_conversions)]
            pub const fn [< $from _to_ $to >](from: $from) -> $to {
                from as $to
            }
        }
    };
}

macro_rules! cast_lossy {
    ($from:ty, $to:ty) => {
        impl crate::cast::CastLossy<$from> for $to {
            #[allow(clippy::as_conversions)]
            fn cast_lossy(from: $from) -> $to {
                from as $to
            }
        }
    };
}

#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
mod target32 {
    cast_from!(u8, usize);
    cast_from!(u16, usize);
    cast_from!(u32, u64);
    cast_from!(u32, usize);
    cast_from!(usize, u64);
    cast_from!(i32, i64);
}
#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
pub use target32::*;

// Casts that are safe on 64-bit architectures.
#[cfg(target_pointer_width = "64")]
mod target64 {
    cast_from!(u64, usize);
}
#[cfg(target_pointer_width = "64")]
pub use target64::*;

cast_lossy!(usize, f64);
cast_lossy!(u64, f64);
cast_lossy!(f64, usize);
cast_lossy!(f64, u64);

#[cfg(test)]
mod tests {
    use super::{CastFrom, CastLossy};

    #[test]
    fn smoketest_casts() {
        assert_eq!(u64::cast_from(12usize), 12);
        assert_eq!(usize::cast_from(12u64), 12);
        assert_eq!(usize::cast_lossy(4.9f64), 4);
        assert_eq!(usize::cast_lossy(-1.0f64), 0);
        assert_eq!(usize::cast_lossy(f64::NAN), 0);
        assert_eq!(f64::cast_lossy(10usize), 10.0);
    }
}
