//! Batch output types

use std::ops::Deref;

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::{Location, Runtime, Storage};
use crate::tensor::{HostBuffer, HostTensor, Shape};

/// One generated tensor
#[derive(Debug)]
pub struct Sample {
    shape: Shape,
    storage: Storage,
}

impl Sample {
    pub(crate) fn new(shape: Shape, storage: Storage) -> Self {
        Self { shape, storage }
    }

    pub(crate) fn into_storage(self) -> Storage {
        self.storage
    }

    /// Shape of the sample
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Element type
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Memory domain holding the values
    pub fn location(&self) -> Location {
        self.storage.location()
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        self.storage.numel()
    }

    /// Backing storage
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Host buffer of the values.
    ///
    /// Fails with [`Error::DeviceResident`] for accelerator samples.
    pub fn host_buffer(&self) -> Result<&HostBuffer> {
        self.storage.as_host().ok_or(Error::DeviceResident)
    }

    /// Typed read-only view of the values (host samples only)
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        self.host_buffer()?.as_slice()
    }

    /// Values converted to f64 (host samples only)
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        Ok(self.host_buffer()?.to_f64_vec())
    }
}

/// Output of one iteration: an ordered sequence of samples
///
/// Sample `i` corresponds to resolved shape `i`. All samples share one dtype
/// and one location.
#[derive(Debug)]
pub struct Batch {
    dtype: DType,
    location: Location,
    samples: Vec<Sample>,
}

impl Batch {
    pub(crate) fn new(dtype: DType, location: Location, samples: Vec<Sample>) -> Self {
        Self {
            dtype,
            location,
            samples,
        }
    }

    pub(crate) fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the batch has no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Element type of every sample
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Memory domain of every sample
    pub fn location(&self) -> Location {
        self.location
    }

    /// Sample `index`
    pub fn sample(&self, index: usize) -> Result<&Sample> {
        self.samples.get(index).ok_or(Error::IndexOutOfBounds {
            index,
            size: self.samples.len(),
        })
    }

    /// All samples in order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Shape of every sample, in order
    pub fn shapes(&self) -> Vec<Shape> {
        self.samples.iter().map(|s| s.shape.clone()).collect()
    }

    /// Whether all samples have the same shape
    pub fn is_dense(&self) -> bool {
        match self.samples.split_first() {
            Some((first, rest)) => rest.iter().all(|s| s.shape == first.shape),
            None => true,
        }
    }

    /// Stack the samples into one `[batch, ...shape]` tensor (host only).
    ///
    /// Fails with [`Error::ShapeMismatch`] when sample shapes differ.
    pub fn as_array<T: Element>(&self) -> Result<HostTensor>
    where
        HostBuffer: From<Vec<T>>,
    {
        if self.location != Location::Host {
            return Err(Error::DeviceResident);
        }
        let Some(first) = self.samples.first() else {
            return Err(Error::shape_mismatch(&[1], &[0]));
        };
        if let Some(other) = self.samples.iter().find(|s| s.shape != first.shape) {
            return Err(Error::shape_mismatch(&first.shape, &other.shape));
        }

        let mut data = Vec::with_capacity(first.numel() * self.samples.len());
        for sample in &self.samples {
            data.extend_from_slice(sample.as_slice::<T>()?);
        }
        let mut dims = Vec::with_capacity(first.shape.ndim() + 1);
        dims.push(self.samples.len());
        dims.extend_from_slice(&first.shape);
        HostTensor::from_vec(data, &dims)
    }
}

/// Borrowed view of the batch a pipeline produced most recently
///
/// The view borrows the pipeline, so the storage cannot be overwritten by
/// another run while the view is alive. Use [`to_host`](Self::to_host) for a
/// copy that outlives it.
#[derive(Clone, Copy)]
pub struct BatchView<'a> {
    batch: &'a Batch,
    runtime: &'a dyn Runtime,
}

impl<'a> BatchView<'a> {
    pub(crate) fn new(batch: &'a Batch, runtime: &'a dyn Runtime) -> Self {
        Self { batch, runtime }
    }

    /// The underlying batch
    pub fn batch(&self) -> &'a Batch {
        self.batch
    }

    /// Copy every sample into host memory.
    ///
    /// Accelerator samples are transferred; host samples are copied. The
    /// result has the same shapes, dtype and values with `Location::Host`.
    pub fn to_host(&self) -> Result<Batch> {
        let samples = self
            .batch
            .samples
            .iter()
            .map(|s| {
                let buffer = self.runtime.transfer_to_host(&s.storage)?;
                Ok(Sample::new(s.shape.clone(), Storage::Host(buffer)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Batch::new(self.batch.dtype, Location::Host, samples))
    }
}

impl Deref for BatchView<'_> {
    type Target = Batch;

    fn deref(&self) -> &Batch {
        self.batch
    }
}

impl std::fmt::Debug for BatchView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchView")
            .field("runtime", &self.runtime.name())
            .field("batch", self.batch)
            .finish()
    }
}
