//! Runtime backends for sample generation
//!
//! This module defines the `Runtime` capability trait and provides
//! implementations for the two memory domains a pipeline can target.
//!
//! # Architecture
//!
//! ```text
//! Runtime (one per memory domain, chosen by Location at build time)
//! ├── allocate          storage for one sample in the runtime's memory
//! ├── fill_normal       generate a whole batch in place
//! └── transfer_to_host  copy a sample's values into process memory
//! ```
//!
//! The pipeline only ever talks to `dyn Runtime`, so it never names a
//! concrete backend.

pub mod cpu;

#[cfg(feature = "wgpu")]
pub mod wgpu;

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::random::{Normal, NormalStream};
use crate::tensor::HostBuffer;
use std::fmt;
use std::str::FromStr;

/// Memory/compute domain where sample storage lives
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Location {
    /// Process memory, filled by the CPU
    #[default]
    #[cfg_attr(feature = "serde", serde(alias = "cpu"))]
    Host,
    /// Accelerator memory, filled by a device kernel
    #[cfg_attr(feature = "serde", serde(alias = "gpu"))]
    Accelerator,
}

impl Location {
    /// Canonical configuration name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Accelerator => "accelerator",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" | "cpu" => Ok(Self::Host),
            "accelerator" | "gpu" | "device" => Ok(Self::Accelerator),
            other => Err(Error::InvalidArgument {
                arg: "location",
                reason: format!("unknown location '{other}', expected host or accelerator"),
            }),
        }
    }
}

/// Backing storage of one sample, tagged by memory domain
#[derive(Debug)]
pub enum Storage {
    /// Values in process memory
    Host(HostBuffer),
    /// Values in accelerator memory
    #[cfg(feature = "wgpu")]
    Device(wgpu::DeviceBuffer),
}

impl Storage {
    /// Element type
    pub fn dtype(&self) -> DType {
        match self {
            Self::Host(buf) => buf.dtype(),
            #[cfg(feature = "wgpu")]
            Self::Device(buf) => buf.dtype(),
        }
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        match self {
            Self::Host(buf) => buf.len(),
            #[cfg(feature = "wgpu")]
            Self::Device(buf) => buf.numel(),
        }
    }

    /// Memory domain of the storage
    pub fn location(&self) -> Location {
        match self {
            Self::Host(_) => Location::Host,
            #[cfg(feature = "wgpu")]
            Self::Device(_) => Location::Accelerator,
        }
    }

    /// Host buffer, if this storage lives in process memory
    pub fn as_host(&self) -> Option<&HostBuffer> {
        match self {
            Self::Host(buf) => Some(buf),
            #[cfg(feature = "wgpu")]
            Self::Device(_) => None,
        }
    }
}

/// Capability interface of a compute backend
///
/// One implementation exists per memory domain. A runtime is fixed for the
/// lifetime of a built pipeline; switching domain means building a new one.
///
/// Implementations are not required to be internally synchronized for
/// concurrent `fill_normal` calls on the same storage; the pipeline drives
/// a runtime from a single logical worker.
pub trait Runtime: Send + Sync + fmt::Debug {
    /// Human-readable name of this runtime
    fn name(&self) -> &'static str;

    /// Memory domain this runtime allocates in
    fn location(&self) -> Location;

    /// Whether samples of `dtype` can be generated by this runtime
    fn supports_dtype(&self, dtype: DType) -> bool;

    /// Allocate storage for `numel` elements of `dtype`.
    ///
    /// Returns [`Error::Allocation`] if the memory cannot be obtained.
    fn allocate(&self, dtype: DType, numel: usize) -> Result<Storage>;

    /// Fill every output with normal samples.
    ///
    /// `outputs[i]` is filled from `streams[i]`; both slices have the same
    /// length. Either all outputs are filled or an error is returned.
    fn fill_normal(
        &self,
        outputs: &mut [Storage],
        streams: &[NormalStream],
        dist: Normal,
    ) -> Result<()>;

    /// Copy a sample's values into a host buffer of the same dtype and length.
    fn transfer_to_host(&self, storage: &Storage) -> Result<HostBuffer>;
}

/// Options a runtime is created with
#[derive(Clone, Debug, Default)]
pub struct RuntimeOptions {
    /// Host worker threads (`None` uses the global pool)
    pub num_threads: Option<usize>,
    /// Accelerator adapter index
    pub device_id: usize,
}

/// Create the runtime for a location.
///
/// Fails with [`Error::UnsupportedConfiguration`] when the accelerator is
/// requested in a build without the `wgpu` feature, and with
/// [`Error::Allocation`] when the device or host worker pool cannot be created.
pub fn create_runtime(location: Location, options: &RuntimeOptions) -> Result<Box<dyn Runtime>> {
    match location {
        Location::Host => Ok(Box::new(cpu::CpuRuntime::new(options.num_threads)?)),
        #[cfg(feature = "wgpu")]
        Location::Accelerator => Ok(Box::new(wgpu::WgpuRuntime::new(options.device_id)?)),
        #[cfg(not(feature = "wgpu"))]
        Location::Accelerator => Err(Error::unsupported(
            "accelerator location requires normpipe to be built with the `wgpu` feature",
        )),
    }
}

/// Whether this build can create an accelerator runtime at all
pub const fn accelerator_compiled() -> bool {
    cfg!(feature = "wgpu")
}

/// Whether `dtype` can be generated at `location` in this build.
///
/// Answers without opening a device, so configuration errors surface
/// before any backend resource is created.
pub fn dtype_supported(location: Location, dtype: DType) -> bool {
    match location {
        Location::Host => true,
        #[cfg(feature = "wgpu")]
        Location::Accelerator => wgpu::shaders::normal::supports(dtype),
        #[cfg(not(feature = "wgpu"))]
        Location::Accelerator => {
            let _ = dtype;
            false
        }
    }
}

pub(crate) fn check_outputs(outputs: &[Storage], streams: &[NormalStream]) -> Result<()> {
    if outputs.len() != streams.len() {
        return Err(Error::InvalidArgument {
            arg: "streams",
            reason: format!(
                "{} outputs but {} streams",
                outputs.len(),
                streams.len()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parse() {
        assert_eq!("host".parse::<Location>().unwrap(), Location::Host);
        assert_eq!("CPU".parse::<Location>().unwrap(), Location::Host);
        assert_eq!("gpu".parse::<Location>().unwrap(), Location::Accelerator);
        assert!("tpu".parse::<Location>().is_err());
        assert_eq!(Location::Accelerator.to_string(), "accelerator");
    }

    #[test]
    fn test_create_host_runtime() {
        let rt = create_runtime(Location::Host, &RuntimeOptions::default()).unwrap();
        assert_eq!(rt.location(), Location::Host);
        assert!(DType::ALL.iter().all(|&d| rt.supports_dtype(d)));
    }

    #[test]
    fn test_dtype_supported() {
        assert!(DType::ALL.iter().all(|&d| dtype_supported(Location::Host, d)));
        assert!(!dtype_supported(Location::Accelerator, DType::F64));
        assert_eq!(
            dtype_supported(Location::Accelerator, DType::F32),
            accelerator_compiled()
        );
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn test_accelerator_unavailable_without_feature() {
        let err = create_runtime(Location::Accelerator, &RuntimeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConfiguration { .. }));
    }
}
