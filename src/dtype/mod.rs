//! Data type system for generated samples
//!
//! This module provides the `DType` enum, the closed set of numeric
//! representations a pipeline can generate, along with the `Element` trait
//! that maps Rust element types onto it.

mod element;

pub use element::Element;

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Numeric representations supported by the normal generator
///
/// Using an enum (rather than generics) allows the element type to be picked
/// from configuration at runtime. Every place that needs the concrete Rust
/// type goes through `dispatch_dtype!`, so adding a
/// representation is a compile error everywhere it is not handled.
///
/// # Discriminant Values
///
/// - Floats: 0-9 (F64=0, F32=1, F16=2)
/// - Signed ints: 10-19 (I32=11, I16=12, I8=13)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    #[cfg_attr(feature = "serde", serde(rename = "float64", alias = "f64"))]
    F64 = 0,
    /// 32-bit floating point
    #[cfg_attr(feature = "serde", serde(rename = "float32", alias = "f32"))]
    F32 = 1,
    /// 16-bit floating point (IEEE 754 half)
    #[cfg_attr(feature = "serde", serde(rename = "float16", alias = "f16"))]
    F16 = 2,
    /// 32-bit signed integer
    #[cfg_attr(feature = "serde", serde(rename = "int32", alias = "i32"))]
    I32 = 11,
    /// 16-bit signed integer
    #[cfg_attr(feature = "serde", serde(rename = "int16", alias = "i16"))]
    I16 = 12,
    /// 8-bit signed integer
    #[cfg_attr(feature = "serde", serde(rename = "int8", alias = "i8"))]
    I8 = 13,
}

impl DType {
    /// All supported dtypes, floats first
    pub const ALL: [DType; 6] = [
        DType::F64,
        DType::F32,
        DType::F16,
        DType::I32,
        DType::I16,
        DType::I8,
    ];

    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 => 8,
            Self::F32 | Self::I32 => 4,
            Self::F16 | Self::I16 => 2,
            Self::I8 => 1,
        }
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32 | Self::F16)
    }

    /// Returns true if this is a signed integer type
    #[inline]
    pub const fn is_int(self) -> bool {
        !self.is_float()
    }

    /// Canonical configuration name (`int8` ... `float64`)
    pub const fn name(self) -> &'static str {
        match self {
            Self::F64 => "float64",
            Self::F32 => "float32",
            Self::F16 => "float16",
            Self::I32 => "int32",
            Self::I16 => "int16",
            Self::I8 => "int8",
        }
    }

    /// Representable range of an integer dtype as f64 bounds
    ///
    /// Returns `None` for floating point types, which are never clamped.
    pub const fn int_range(self) -> Option<(f64, f64)> {
        match self {
            Self::I32 => Some((i32::MIN as f64, i32::MAX as f64)),
            Self::I16 => Some((i16::MIN as f64, i16::MAX as f64)),
            Self::I8 => Some((i8::MIN as f64, i8::MAX as f64)),
            Self::F64 | Self::F32 | Self::F16 => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float64" | "f64" | "double" => Ok(Self::F64),
            "float32" | "f32" | "float" => Ok(Self::F32),
            "float16" | "f16" | "half" => Ok(Self::F16),
            "int32" | "i32" => Ok(Self::I32),
            "int16" | "i16" => Ok(Self::I16),
            "int8" | "i8" => Ok(Self::I8),
            other => Err(Error::InvalidArgument {
                arg: "dtype",
                reason: format!(
                    "unknown numeric type '{other}', expected one of int8, int16, int32, float16, float32, float64"
                ),
            }),
        }
    }
}

/// Run a block with `$T` bound to the Rust element type of a `DType`
///
/// ```ignore
/// dispatch_dtype!(dtype, T => {
///     let zeros = vec![T::zeroed(); n];
/// });
/// ```
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:block) => {
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::dtype::DType::F16 => {
                type $T = half::f16;
                $body
            }
            $crate::dtype::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::dtype::DType::I16 => {
                type $T = i16;
                $body
            }
            $crate::dtype::DType::I8 => {
                type $T = i8;
                $body
            }
        }
    };
}

pub(crate) use dispatch_dtype;
