//! Element trait for mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};
use half::f16;
use std::fmt::Debug;

/// Trait for types that can be elements of a generated sample
///
/// This trait connects Rust's type system to the runtime dtype system and
/// owns the conversion from a real-valued normal draw into the element type.
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - Basic trait requirements
/// - `Pod + Zeroable` - Safe memory transmutation (bytemuck)
/// - `PartialOrd + Debug` - Comparison and diagnostics in tests
pub trait Element: Copy + Send + Sync + Pod + Zeroable + PartialOrd + Debug + 'static {
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert a real-valued sample into this type.
    ///
    /// Floating point types are a plain cast (values outside the range of a
    /// narrow float become infinite). Integer types round half away from zero
    /// and saturate at the representable bounds; NaN maps to zero.
    fn from_sample(v: f64) -> Self;

    /// Convert to f64 for statistics and comparisons
    fn to_f64(self) -> f64;

    /// One value
    fn one() -> Self;
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    #[inline]
    fn from_sample(v: f64) -> Self {
        v
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn one() -> Self {
        1.0
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn from_sample(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn one() -> Self {
        1.0
    }
}

impl Element for f16 {
    const DTYPE: DType = DType::F16;

    #[inline]
    fn from_sample(v: f64) -> Self {
        f16::from_f64(v)
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn one() -> Self {
        f16::ONE
    }
}

/// Round half away from zero, then clamp into `[lo, hi]`.
#[inline(always)]
fn saturate_round(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.round().clamp(lo, hi)
}

macro_rules! impl_int_element {
    ($t:ty, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            #[inline]
            fn from_sample(v: f64) -> Self {
                saturate_round(v, <$t>::MIN as f64, <$t>::MAX as f64) as $t
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn one() -> Self {
                1
            }
        }
    };
}

impl_int_element!(i32, DType::I32);
impl_int_element!(i16, DType::I16);
impl_int_element!(i8, DType::I8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_saturates_instead_of_wrapping() {
        assert_eq!(i8::from_sample(300.7), 127);
        assert_eq!(i8::from_sample(-1e9), -128);
        assert_eq!(i16::from_sample(40_000.0), i16::MAX);
        assert_eq!(i16::from_sample(-40_000.0), i16::MIN);
        assert_eq!(i32::from_sample(1e12), i32::MAX);
        assert_eq!(i32::from_sample(f64::NEG_INFINITY), i32::MIN);
    }

    #[test]
    fn test_int_rounds_half_away_from_zero() {
        assert_eq!(i8::from_sample(0.5), 1);
        assert_eq!(i8::from_sample(-0.5), -1);
        assert_eq!(i8::from_sample(1.49), 1);
        assert_eq!(i16::from_sample(-2.51), -3);
        assert_eq!(i32::from_sample(0.0), 0);
    }

    #[test]
    fn test_int_nan_is_zero() {
        assert_eq!(i8::from_sample(f64::NAN), 0);
        assert_eq!(i32::from_sample(f64::NAN), 0);
    }

    #[test]
    fn test_float_is_plain_cast() {
        assert_eq!(f64::from_sample(1.25), 1.25);
        assert_eq!(f32::from_sample(-0.1), -0.1f32);
        assert_eq!(f16::from_sample(0.5), f16::from_f32(0.5));
        assert!(f16::from_sample(1e6).is_infinite());
    }
}
