//! CPU runtime implementation

use super::kernels::normal_kernel;
use crate::dtype::{dispatch_dtype, DType};
use crate::error::{Error, Result};
use crate::random::{Normal, NormalStream};
use crate::runtime::{check_outputs, Location, Runtime, Storage};
use crate::tensor::HostBuffer;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// CPU compute runtime
///
/// This is the default runtime and works on any platform. Memory is ordinary
/// heap memory; every dtype is supported.
#[derive(Debug, Default)]
pub struct CpuRuntime {
    /// Dedicated worker pool; `None` runs on the global rayon pool
    #[cfg(feature = "rayon")]
    pool: Option<rayon::ThreadPool>,
}

impl CpuRuntime {
    /// Create a CPU runtime.
    ///
    /// `num_threads` sizes a dedicated worker pool. `None` uses the global
    /// pool (or the calling thread when built without `rayon`). Zero threads
    /// is rejected.
    pub fn new(num_threads: Option<usize>) -> Result<Self> {
        if num_threads == Some(0) {
            return Err(Error::InvalidArgument {
                arg: "num_threads",
                reason: "must be at least 1".to_string(),
            });
        }

        #[cfg(feature = "rayon")]
        {
            let pool = match num_threads {
                Some(n) => Some(
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(n)
                        .thread_name(|i| format!("normpipe-cpu-{i}"))
                        .build()
                        .map_err(|e| {
                            Error::allocation(format!("{n} host worker threads"), e.to_string())
                        })?,
                ),
                None => None,
            };
            log::debug!("cpu runtime: {:?} worker threads", num_threads);
            Ok(Self { pool })
        }

        #[cfg(not(feature = "rayon"))]
        {
            if num_threads.is_some_and(|n| n > 1) {
                log::warn!(
                    "num_threads={:?} ignored: normpipe was built without the `rayon` feature",
                    num_threads
                );
            }
            Ok(Self {})
        }
    }

    fn fill_batch(outputs: &mut [Storage], streams: &[NormalStream], dist: Normal) -> Result<()> {
        #[cfg(feature = "rayon")]
        {
            outputs
                .par_iter_mut()
                .zip(streams.par_iter())
                .try_for_each(|(out, &stream)| fill_storage(out, stream, dist))
        }

        #[cfg(not(feature = "rayon"))]
        {
            outputs
                .iter_mut()
                .zip(streams.iter())
                .try_for_each(|(out, &stream)| fill_storage(out, stream, dist))
        }
    }
}

fn fill_storage(out: &mut Storage, stream: NormalStream, dist: Normal) -> Result<()> {
    let buf = match out {
        Storage::Host(buf) => buf,
        #[cfg(feature = "wgpu")]
        Storage::Device(_) => {
            return Err(Error::Backend(
                "cpu runtime cannot fill accelerator storage".to_string(),
            ))
        }
    };
    dispatch_dtype!(buf.dtype(), T => {
        normal_kernel(buf.as_mut_slice::<T>()?, stream, dist);
    });
    Ok(())
}

impl Runtime for CpuRuntime {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn location(&self) -> Location {
        Location::Host
    }

    fn supports_dtype(&self, _dtype: DType) -> bool {
        true
    }

    fn allocate(&self, dtype: DType, numel: usize) -> Result<Storage> {
        Ok(Storage::Host(HostBuffer::zeros(dtype, numel)?))
    }

    fn fill_normal(
        &self,
        outputs: &mut [Storage],
        streams: &[NormalStream],
        dist: Normal,
    ) -> Result<()> {
        check_outputs(outputs, streams)?;

        #[cfg(feature = "rayon")]
        if let Some(pool) = &self.pool {
            return pool.install(|| Self::fill_batch(outputs, streams, dist));
        }

        Self::fill_batch(outputs, streams, dist)
    }

    fn transfer_to_host(&self, storage: &Storage) -> Result<HostBuffer> {
        match storage {
            Storage::Host(buf) => Ok(buf.clone()),
            #[cfg(feature = "wgpu")]
            Storage::Device(_) => Err(Error::Backend(
                "cpu runtime cannot read accelerator storage".to_string(),
            )),
        }
    }
}
