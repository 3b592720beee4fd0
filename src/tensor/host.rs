//! Host-resident buffers and tensors

use super::Shape;
use crate::dtype::{dispatch_dtype, DType, Element};
use crate::error::{Error, Result};
use bytemuck::Zeroable;
use half::f16;

/// A typed, contiguous buffer in process memory
///
/// Closed union over the supported element types; the variant is the dtype.
#[derive(Clone, Debug, PartialEq)]
pub enum HostBuffer {
    /// float64 values
    F64(Vec<f64>),
    /// float32 values
    F32(Vec<f32>),
    /// float16 values
    F16(Vec<f16>),
    /// int32 values
    I32(Vec<i32>),
    /// int16 values
    I16(Vec<i16>),
    /// int8 values
    I8(Vec<i8>),
}

/// Apply an expression to the inner `Vec` of a `HostBuffer`, whatever its type
macro_rules! with_vec {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            HostBuffer::F64($v) => $body,
            HostBuffer::F32($v) => $body,
            HostBuffer::F16($v) => $body,
            HostBuffer::I32($v) => $body,
            HostBuffer::I16($v) => $body,
            HostBuffer::I8($v) => $body,
        }
    };
}

impl HostBuffer {
    /// Allocate a zero-filled buffer of `numel` elements.
    ///
    /// Allocation failure is reported as [`Error::Allocation`] rather than
    /// aborting the process.
    pub fn zeros(dtype: DType, numel: usize) -> Result<Self> {
        dispatch_dtype!(dtype, T => {
            let mut v: Vec<T> = Vec::new();
            v.try_reserve_exact(numel).map_err(|e| {
                Error::allocation(
                    format!("host buffer of {numel} {dtype} elements"),
                    e.to_string(),
                )
            })?;
            v.resize(numel, T::zeroed());
            Ok(HostBuffer::from(v))
        })
    }

    /// Build a buffer from little-endian bytes, as read back from a device.
    ///
    /// `bytes` may be longer than `numel` elements (device buffers are padded
    /// to 4 bytes); the tail is ignored.
    pub fn from_bytes(dtype: DType, numel: usize, bytes: &[u8]) -> Result<Self> {
        let needed = numel * dtype.size_in_bytes();
        if bytes.len() < needed {
            return Err(Error::Backend(format!(
                "readback returned {} bytes, {} needed for {numel} {dtype} elements",
                bytes.len(),
                needed
            )));
        }
        let mut out = Self::zeros(dtype, numel)?;
        out.as_bytes_mut().copy_from_slice(&bytes[..needed]);
        Ok(out)
    }

    /// Element type of this buffer
    pub fn dtype(&self) -> DType {
        match self {
            Self::F64(_) => DType::F64,
            Self::F32(_) => DType::F32,
            Self::F16(_) => DType::F16,
            Self::I32(_) => DType::I32,
            Self::I16(_) => DType::I16,
            Self::I8(_) => DType::I8,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        with_vec!(self, v => v.len())
    }

    /// Whether the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of the buffer
    pub fn as_bytes(&self) -> &[u8] {
        with_vec!(self, v => bytemuck::cast_slice(v.as_slice()))
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        with_vec!(self, v => bytemuck::cast_slice_mut(v.as_mut_slice()))
    }

    /// Typed view of the values. Fails if `T` is not the buffer's element type.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        if T::DTYPE != self.dtype() {
            return Err(Error::DTypeMismatch {
                expected: self.dtype(),
                got: T::DTYPE,
            });
        }
        // Same element type, so this is an identity cast.
        Ok(with_vec!(self, v => bytemuck::cast_slice(v.as_slice())))
    }

    /// Typed mutable view of the values.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        let dtype = self.dtype();
        if T::DTYPE != dtype {
            return Err(Error::DTypeMismatch {
                expected: dtype,
                got: T::DTYPE,
            });
        }
        Ok(with_vec!(self, v => bytemuck::cast_slice_mut(v.as_mut_slice())))
    }

    /// Copy all values out as f64
    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_vec!(self, v => v.iter().map(|&x| x.to_f64()).collect())
    }
}

macro_rules! impl_from_vec {
    ($t:ty, $variant:ident) => {
        impl From<Vec<$t>> for HostBuffer {
            fn from(v: Vec<$t>) -> Self {
                HostBuffer::$variant(v)
            }
        }
    };
}

impl_from_vec!(f64, F64);
impl_from_vec!(f32, F32);
impl_from_vec!(f16, F16);
impl_from_vec!(i32, I32);
impl_from_vec!(i16, I16);
impl_from_vec!(i8, I8);

/// An n-dimensional tensor in host memory
///
/// This is what the external source feeds into a pipeline, and what
/// host-located samples are made of. Only the shape of a fed tensor is
/// consumed by the normal generator.
#[derive(Clone, Debug, PartialEq)]
pub struct HostTensor {
    shape: Shape,
    buffer: HostBuffer,
}

impl HostTensor {
    /// Create a tensor from data and shape.
    ///
    /// The shape is not required to be valid for generation here; the
    /// pipeline validates fed shapes when they are fed.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> Result<Self>
    where
        HostBuffer: From<Vec<T>>,
    {
        Self::from_buffer(HostBuffer::from(data), shape)
    }

    /// Create a tensor from an existing buffer.
    pub fn from_buffer(buffer: HostBuffer, shape: &[usize]) -> Result<Self> {
        let shape = Shape::from(shape);
        if buffer.len() != element_count(&shape)? {
            return Err(Error::shape_mismatch(shape.as_slice(), &[buffer.len()]));
        }
        Ok(Self { shape, buffer })
    }

    /// Zero-filled tensor
    pub fn zeros(shape: &[usize], dtype: DType) -> Result<Self> {
        let numel = element_count(&Shape::from(shape))?;
        Self::from_buffer(HostBuffer::zeros(dtype, numel)?, shape)
    }

    /// Tensor filled with ones
    pub fn ones(shape: &[usize], dtype: DType) -> Result<Self> {
        let mut tensor = Self::zeros(shape, dtype)?;
        dispatch_dtype!(dtype, T => {
            tensor.buffer.as_mut_slice::<T>()?.fill(T::one());
        });
        Ok(tensor)
    }

    /// Shape of the tensor
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Element type
    pub fn dtype(&self) -> DType {
        self.buffer.dtype()
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        self.buffer.len()
    }

    /// Underlying buffer
    pub fn buffer(&self) -> &HostBuffer {
        &self.buffer
    }

    /// Typed view of the values
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        self.buffer.as_slice()
    }
}

fn element_count(shape: &Shape) -> Result<usize> {
    shape.checked_numel().ok_or_else(|| {
        Error::invalid_shape(
            shape.iter().map(|&d| d as i64),
            "element count overflows usize",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_has_requested_dtype_and_len() {
        for dtype in DType::ALL {
            let buf = HostBuffer::zeros(dtype, 7).unwrap();
            assert_eq!(buf.dtype(), dtype);
            assert_eq!(buf.len(), 7);
            assert_eq!(buf.as_bytes().len(), 7 * dtype.size_in_bytes());
            assert!(buf.to_f64_vec().iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn test_as_slice_checks_dtype() {
        let buf = HostBuffer::I16(vec![1, -2, 3]);
        assert_eq!(buf.as_slice::<i16>().unwrap(), &[1, -2, 3]);
        assert!(matches!(
            buf.as_slice::<f32>(),
            Err(Error::DTypeMismatch {
                expected: DType::I16,
                got: DType::F32
            })
        ));
    }

    #[test]
    fn test_from_bytes_ignores_padding() {
        let bytes = [1u8, 0xFF, 3, 0];
        let buf = HostBuffer::from_bytes(DType::I8, 3, &bytes).unwrap();
        assert_eq!(buf.as_slice::<i8>().unwrap(), &[1, -1, 3]);
        assert!(HostBuffer::from_bytes(DType::I32, 2, &bytes).is_err());
    }

    #[test]
    fn test_from_bytes_f16_little_endian() {
        let one = f16::from_f32(1.0).to_bits().to_le_bytes();
        let half = f16::from_f32(-0.5).to_bits().to_le_bytes();
        let bytes = [one[0], one[1], half[0], half[1]];
        let buf = HostBuffer::from_bytes(DType::F16, 2, &bytes).unwrap();
        assert_eq!(buf.to_f64_vec(), vec![1.0, -0.5]);
    }

    #[test]
    fn test_tensor_from_vec_checks_len() {
        let t = HostTensor::from_vec(vec![1.0f32; 6], &[2, 3]).unwrap();
        assert_eq!(t.shape().as_slice(), &[2, 3]);
        assert_eq!(t.dtype(), DType::F32);
        assert!(matches!(
            HostTensor::from_vec(vec![1i8; 5], &[2, 3]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_overflowing_shape_is_an_error() {
        let huge = [usize::MAX, 2];
        for result in [
            HostTensor::zeros(&huge, DType::I8),
            HostTensor::ones(&huge, DType::F32),
            HostTensor::from_vec(vec![0i16; 4], &huge),
            HostTensor::from_buffer(HostBuffer::F64(vec![0.0; 2]), &huge),
        ] {
            assert!(matches!(result, Err(Error::InvalidShape { .. })), "{result:?}");
        }
    }

    #[test]
    fn test_from_buffer_keeps_dtype() {
        let t = HostTensor::from_buffer(HostBuffer::I16(vec![1, 2, 3, 4]), &[2, 2]).unwrap();
        assert_eq!(t.dtype(), DType::I16);
        assert_eq!(t.as_slice::<i16>().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_ones() {
        let t = HostTensor::ones(&[100, 10, 10], DType::F64).unwrap();
        assert_eq!(t.numel(), 10_000);
        assert!(t.as_slice::<f64>().unwrap().iter().all(|&x| x == 1.0));
        let t = HostTensor::ones(&[4], DType::F16).unwrap();
        assert_eq!(t.buffer().to_f64_vec(), vec![1.0; 4]);
    }
}
