//! Shape type: dimensions of a sample

use crate::error::{Error, Result};
use smallvec::SmallVec;
use std::fmt;
use std::iter::FromIterator;
use std::ops::Deref;

/// Stack allocation threshold for dimensions
/// Most samples have 4 or fewer dimensions, so we stack-allocate up to 4
pub(crate) const STACK_DIMS: usize = 4;

/// Shape type: dimensions of a sample
///
/// A shape produced by [`Shape::new`] or [`Shape::from_signed`] is always
/// valid for generation: rank at least 1 and every dimension positive.
/// The `From` conversions are unchecked and are meant for building expected
/// values; run [`Shape::validate`] before handing such a shape to a pipeline.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Shape(SmallVec<[usize; STACK_DIMS]>);

impl Shape {
    /// Create a validated shape from unsigned dimensions.
    pub fn new(dims: &[usize]) -> Result<Self> {
        let shape: Self = dims.into();
        shape.validate()?;
        Ok(shape)
    }

    /// Create a validated shape from signed dimensions, as they arrive from
    /// configuration. Non-positive values are rejected instead of wrapping.
    pub fn from_signed(dims: &[i64]) -> Result<Self> {
        if dims.is_empty() {
            return Err(Error::invalid_shape(
                dims.iter().copied(),
                "shape must have at least one dimension",
            ));
        }
        let mut shape = Self(SmallVec::with_capacity(dims.len()));
        for &d in dims {
            if d <= 0 {
                return Err(Error::invalid_shape(
                    dims.iter().copied(),
                    format!("dimension {d} is not positive"),
                ));
            }
            let d = usize::try_from(d).map_err(|_| {
                Error::invalid_shape(dims.iter().copied(), "dimension exceeds usize")
            })?;
            shape.0.push(d);
        }
        shape.validate()?;
        Ok(shape)
    }

    /// Shape of a single element: `[1]`.
    pub fn scalar() -> Self {
        Self(SmallVec::from_slice(&[1]))
    }

    /// Check rank >= 1, all dimensions positive and a representable element count.
    pub fn validate(&self) -> Result<()> {
        let signed = || self.0.iter().map(|&d| d as i64);
        if self.0.is_empty() {
            return Err(Error::invalid_shape(
                signed(),
                "shape must have at least one dimension",
            ));
        }
        if let Some(&d) = self.0.iter().find(|&&d| d == 0) {
            return Err(Error::invalid_shape(
                signed(),
                format!("dimension {d} is not positive"),
            ));
        }
        if self.checked_numel().is_none() {
            return Err(Error::invalid_shape(signed(), "element count overflows usize"));
        }
        Ok(())
    }

    /// View shape as a slice.
    pub fn as_slice(&self) -> &[usize] {
        self.0.as_slice()
    }

    /// Number of dimensions in this shape.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements.
    #[inline]
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// Element count, or `None` if it overflows `usize`
    pub(crate) fn checked_numel(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }
}

impl Deref for Shape {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<[usize]> for Shape {
    fn as_ref(&self) -> &[usize] {
        self.0.as_slice()
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Self(value.into_iter().collect())
    }
}

impl From<&[usize]> for Shape {
    fn from(value: &[usize]) -> Self {
        Self(value.iter().copied().collect())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Self(value.into_iter().collect())
    }
}

impl FromIterator<usize> for Shape {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
