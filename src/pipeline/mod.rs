//! Pipeline execution contract
//!
//! A [`Pipeline`] owns its configuration, the runtime it generates on, the
//! generator position and the storage of the most recent batch.
//!
//! ```text
//! Unbuilt --build()--> Built --run()--> Iterating --run()--> Iterating ...
//!                        ^ feed() before each run with ShapeSource::ExternalInput
//! ```
//!
//! A pipeline is driven by one caller at a time: `run` and `feed` take
//! `&mut self`.

mod batch;
mod config;
mod external_source;

pub use batch::{Batch, BatchView, Sample};
pub use config::{PipelineConfig, ShapeSource};

use crate::error::{Error, Result};
use crate::random::{blocks_for, NormalStream};
use crate::runtime::{create_runtime, dtype_supported, Runtime, Storage};
use crate::tensor::{HostTensor, Shape};
use external_source::ExternalSource;

/// Lifecycle state of a pipeline
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// Configuration only, no resources
    Unbuilt,
    /// Resources allocated, no batch produced yet
    Built,
    /// At least one batch produced
    Iterating,
}

/// Resources that exist once a pipeline is built
#[derive(Debug)]
struct Built {
    runtime: Box<dyn Runtime>,
    /// Position of the next batch's first sample
    stream: NormalStream,
}

/// A normal-distribution generation pipeline
///
/// ```
/// use normpipe::prelude::*;
///
/// let mut pipeline = Pipeline::new(
///     PipelineConfig::new()
///         .with_shape_source(ShapeSource::static_shape(&[10, 20, 30])?)
///         .with_seed(42),
/// )?;
/// pipeline.build()?;
///
/// let batch = pipeline.run()?;
/// let sample = batch.sample(0)?;
/// assert_eq!(sample.shape().as_slice(), &[10, 20, 30]);
/// assert_eq!(sample.as_slice::<f32>()?.len(), 6000);
/// # Ok::<(), normpipe::Error>(())
/// ```
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    built: Option<Built>,
    external: ExternalSource,
    outputs: Option<Batch>,
    iteration: u64,
}

impl Pipeline {
    /// Create an unbuilt pipeline, validating the configuration.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            built: None,
            external: ExternalSource::default(),
            outputs: None,
            iteration: 0,
        })
    }

    /// Create the runtime and seed the generator.
    ///
    /// Fails with [`Error::UnsupportedConfiguration`] when the location cannot
    /// produce the configured dtype, and with [`Error::Allocation`] when the
    /// backend cannot be created. Building a built pipeline does nothing.
    pub fn build(&mut self) -> Result<()> {
        if self.built.is_some() {
            return Ok(());
        }

        let config = &self.config;
        if !dtype_supported(config.location, config.dtype) {
            return Err(Error::unsupported(format!(
                "{} samples are not supported at location {}",
                config.dtype, config.location
            )));
        }
        let runtime = create_runtime(config.location, &config.runtime_options())?;

        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random::<u64>();
                log::info!("no seed configured, using random seed {}", seed);
                seed
            }
        };

        log::debug!(
            "pipeline built: runtime={} dtype={} shape_source={} batch_size={} seed={}",
            runtime.name(),
            config.dtype,
            config.shape_source.name(),
            config.batch_size,
            seed
        );

        self.built = Some(Built {
            runtime,
            stream: NormalStream::new(seed),
        });
        Ok(())
    }

    /// Supply the tensors whose shapes the next run generates.
    ///
    /// Only valid for [`ShapeSource::ExternalInput`] pipelines, after `build`.
    /// Feeding twice before a run replaces the earlier input (a warning is
    /// logged). An empty batch, or a tensor with rank 0 or a zero dimension,
    /// fails with [`Error::InvalidShape`] and keeps any earlier input.
    pub fn feed(&mut self, batch: &[HostTensor]) -> Result<()> {
        if self.built.is_none() {
            return Err(Error::NotBuilt { op: "feed" });
        }
        if !self.config.shape_source.is_external() {
            return Err(Error::InvalidArgument {
                arg: "batch",
                reason: format!(
                    "shape source is {}; only external_input pipelines accept fed input",
                    self.config.shape_source.name()
                ),
            });
        }
        self.external.feed(batch, self.iteration)
    }

    /// Produce the next batch.
    ///
    /// On error nothing is committed: the generator position and any fed
    /// input are unchanged, so the same iteration can be retried. Storage of
    /// the previous batch is reused when element counts match.
    ///
    /// A failed allocation keeps the previous batch. A failed fill discards
    /// it, since reused storage may already be partly overwritten.
    pub fn run(&mut self) -> Result<BatchView<'_>> {
        let built = self.built.as_mut().ok_or(Error::NotBuilt { op: "run" })?;
        let shapes = resolve_shapes(&self.config, &self.external, self.iteration)?;

        let mut streams = Vec::with_capacity(shapes.len());
        let mut blocks = 0u64;
        for shape in &shapes {
            streams.push(built.stream.advance(blocks));
            blocks += blocks_for(shape.numel());
        }

        // Allocate before the previous batch is taken, so a failed
        // allocation leaves it in place.
        let dtype = self.config.dtype;
        let reusable = self.outputs.as_ref().map(Batch::samples).unwrap_or_default();
        let mut fresh: Vec<Option<Storage>> = Vec::with_capacity(shapes.len());
        for (i, shape) in shapes.iter().enumerate() {
            let numel = shape.numel();
            let reuse = reusable
                .get(i)
                .is_some_and(|s| s.numel() == numel && s.dtype() == dtype);
            fresh.push(if reuse {
                None
            } else {
                Some(built.runtime.allocate(dtype, numel)?)
            });
        }
        let allocated = fresh.iter().filter(|s| s.is_some()).count();
        if allocated > 0 {
            log::debug!(
                "iteration {}: allocated {} of {} sample buffers",
                self.iteration,
                allocated,
                shapes.len()
            );
        }

        let mut previous = self
            .outputs
            .take()
            .map(Batch::into_samples)
            .unwrap_or_default()
            .into_iter();
        let mut storages = fresh
            .into_iter()
            .map(|slot| {
                let old = previous.next();
                slot.or_else(|| old.map(Sample::into_storage))
            })
            .collect::<Option<Vec<Storage>>>()
            .ok_or_else(|| Error::Backend("previous batch lost a reusable sample".into()))?;
        drop(previous);

        built
            .runtime
            .fill_normal(&mut storages, &streams, self.config.distribution())?;

        log::trace!(
            "iteration {}: {} samples, counters {}..{}",
            self.iteration,
            shapes.len(),
            built.stream.counter,
            built.stream.counter.wrapping_add(blocks)
        );
        built.stream = built.stream.advance(blocks);
        self.external.take();
        self.iteration += 1;

        let samples = shapes
            .into_iter()
            .zip(storages)
            .map(|(shape, storage)| Sample::new(shape, storage))
            .collect();
        let batch = self.outputs.insert(Batch::new(
            dtype,
            built.runtime.location(),
            samples,
        ));
        Ok(BatchView::new(batch, &*built.runtime))
    }

    /// The batch produced by the most recent successful run
    ///
    /// `None` before the first run, and after a run whose fill failed.
    pub fn outputs(&self) -> Option<BatchView<'_>> {
        let built = self.built.as_ref()?;
        let batch = self.outputs.as_ref()?;
        Some(BatchView::new(batch, &*built.runtime))
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        match (&self.built, self.iteration) {
            (None, _) => PipelineState::Unbuilt,
            (Some(_), 0) => PipelineState::Built,
            (Some(_), _) => PipelineState::Iterating,
        }
    }

    /// Number of successful runs
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Seed in use: the configured one, or the one drawn at build time
    pub fn seed(&self) -> Option<u64> {
        self.built
            .as_ref()
            .map(|b| b.stream.key)
            .or(self.config.seed)
    }

    /// Configured batch size (external input pipelines size batches by feed)
    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Whether fed input is waiting for the next run
    pub fn has_pending_input(&self) -> bool {
        self.external.has_pending()
    }

    /// The configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

/// Shapes of the next batch, in sample order
fn resolve_shapes(
    config: &PipelineConfig,
    external: &ExternalSource,
    iteration: u64,
) -> Result<Vec<Shape>> {
    match &config.shape_source {
        ShapeSource::ExternalInput => external
            .peek()
            .map(<[Shape]>::to_vec)
            .ok_or(Error::MissingInput { iteration }),
        ShapeSource::StaticShape(shape) => Ok(vec![shape.clone(); config.batch_size]),
        ShapeSource::Default => Ok(vec![Shape::scalar(); config.batch_size]),
    }
}
