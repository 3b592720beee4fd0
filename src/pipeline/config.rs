//! Pipeline configuration

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::random::Normal;
use crate::runtime::{Location, RuntimeOptions};
use crate::tensor::Shape;

/// Where each sample's shape comes from
///
/// Fixed for the lifetime of a pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ShapeSource {
    /// One fed host tensor per sample; the batch size is the number fed
    ExternalInput,
    /// The same shape for every sample
    StaticShape(Shape),
    /// A single element per sample
    #[default]
    Default,
}

impl ShapeSource {
    /// Static shape from signed dimensions, validated now rather than at run time.
    pub fn static_shape(dims: &[i64]) -> Result<Self> {
        Ok(Self::StaticShape(Shape::from_signed(dims)?))
    }

    /// Whether shapes are fed per iteration
    pub fn is_external(&self) -> bool {
        matches!(self, Self::ExternalInput)
    }

    /// Check a static shape (which may have been deserialized unchecked)
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::StaticShape(shape) => shape.validate(),
            Self::ExternalInput | Self::Default => Ok(()),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExternalInput => "external_input",
            Self::StaticShape(_) => "static_shape",
            Self::Default => "default",
        }
    }
}

/// Configuration of a normal-generation pipeline
///
/// ```
/// use normpipe::prelude::*;
///
/// let config = PipelineConfig::new()
///     .with_dtype(DType::F16)
///     .with_shape_source(ShapeSource::static_shape(&[10, 20, 30])?)
///     .with_batch_size(4)
///     .with_seed(42);
/// config.validate()?;
/// # Ok::<(), normpipe::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct PipelineConfig {
    /// Element type of every sample
    #[cfg_attr(feature = "serde", serde(rename = "numeric_type", alias = "dtype"))]
    pub dtype: DType,
    /// Memory domain of every sample
    pub location: Location,
    /// Where sample shapes come from
    pub shape_source: ShapeSource,
    /// Samples per batch (ignored with [`ShapeSource::ExternalInput`])
    pub batch_size: usize,
    /// Generator seed; drawn at random at build time when absent
    pub seed: Option<u64>,
    /// Distribution mean
    pub mean: f64,
    /// Distribution standard deviation
    pub stddev: f64,
    /// Host worker threads (`None` uses the global pool)
    pub num_threads: Option<usize>,
    /// Accelerator adapter index
    pub device_id: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dtype: DType::F32,
            location: Location::Host,
            shape_source: ShapeSource::Default,
            batch_size: 1,
            seed: None,
            mean: Normal::STANDARD.mean,
            stddev: Normal::STANDARD.stddev,
            num_threads: None,
            device_id: 0,
        }
    }
}

impl PipelineConfig {
    /// Default configuration: one float32 scalar per batch on the host
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the element type
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Set the shape source
    pub fn with_shape_source(mut self, shape_source: ShapeSource) -> Self {
        self.shape_source = shape_source;
        self
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the distribution mean and standard deviation
    pub fn with_distribution(mut self, mean: f64, stddev: f64) -> Self {
        self.mean = mean;
        self.stddev = stddev;
        self
    }

    /// Set the host worker thread count
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Set the accelerator adapter index
    pub fn with_device_id(mut self, device_id: usize) -> Self {
        self.device_id = device_id;
        self
    }

    /// Distribution parameters
    pub fn distribution(&self) -> Normal {
        Normal {
            mean: self.mean,
            stddev: self.stddev,
        }
    }

    pub(crate) fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            num_threads: self.num_threads,
            device_id: self.device_id,
        }
    }

    /// Check everything that can be checked without touching a backend.
    pub fn validate(&self) -> Result<()> {
        self.shape_source.validate()?;
        if !self.shape_source.is_external() && self.batch_size == 0 {
            return Err(Error::InvalidArgument {
                arg: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.num_threads == Some(0) {
            return Err(Error::InvalidArgument {
                arg: "num_threads",
                reason: "must be at least 1".to_string(),
            });
        }
        self.distribution().validate()
    }
}
