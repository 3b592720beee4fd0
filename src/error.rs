//! Error types for normpipe

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using normpipe's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring, building or running a pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// A shape has rank 0 or a non-positive dimension
    #[error("Invalid shape {shape:?}: {reason}")]
    InvalidShape {
        /// The offending dimensions, as given
        shape: Vec<i64>,
        /// Why the shape was rejected
        reason: String,
    },

    /// The dtype/location combination (or the location itself) is not
    /// available with this build or device
    #[error("Unsupported configuration: {reason}")]
    UnsupportedConfiguration {
        /// Description of the unsupported combination
        reason: String,
    },

    /// The pipeline reads its shapes from an external source, but nothing was
    /// fed for the current iteration
    #[error("Missing input: no batch was fed for iteration {iteration}")]
    MissingInput {
        /// Iteration that was attempted
        iteration: u64,
    },

    /// An operation that needs backend resources was called before `build`
    #[error("Pipeline is not built: '{op}' requires a prior call to build()")]
    NotBuilt {
        /// The operation name
        op: &'static str,
    },

    /// Backend resource allocation failed
    #[error("Allocation failed for {resource}: {reason}")]
    Allocation {
        /// What was being allocated
        resource: String,
        /// Reason reported by the backend
        reason: String,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Shape mismatch in an operation
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Typed access with an element type that does not match the buffer
    #[error("DType mismatch: buffer holds {expected}, requested {got}")]
    DTypeMismatch {
        /// Buffer dtype
        expected: DType,
        /// Requested dtype
        got: DType,
    },

    /// Sample index out of bounds
    #[error("Index {index} out of bounds for batch of size {size}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Number of samples
        size: usize,
    },

    /// Values live in accelerator memory and must be transferred first
    #[error("Sample storage is accelerator-resident; call to_host() first")]
    DeviceResident,

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Create an invalid shape error from any dimension list
    pub fn invalid_shape(shape: impl IntoIterator<Item = i64>, reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            shape: shape.into_iter().collect(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported configuration error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration {
            reason: reason.into(),
        }
    }

    /// Create an allocation error
    pub fn allocation(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Allocation {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Whether the caller can fix the cause and retry the same iteration.
    ///
    /// Only a missing feed is recoverable; everything else is a configuration
    /// or programming error, or a fatal backend failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_input_is_recoverable() {
        assert!(Error::MissingInput { iteration: 3 }.is_recoverable());
        assert!(!Error::NotBuilt { op: "run" }.is_recoverable());
        assert!(!Error::allocation("host buffer", "oom").is_recoverable());
        assert!(!Error::unsupported("float64 on wgpu").is_recoverable());
    }

    #[test]
    fn test_invalid_shape_keeps_signed_dims() {
        let err = Error::invalid_shape([10, -2, 3], "dimension must be positive");
        match err {
            Error::InvalidShape { shape, .. } => assert_eq!(shape, vec![10, -2, 3]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
